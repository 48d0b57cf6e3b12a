//! End-to-end tests running the service against stub codec executables
//!
//! The stubs are shell scripts, so these tests only run on unix.

#![cfg(unix)]

mod common;

use common::*;
use ppconv::{ConversionService, Error, Event};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn compress_reports_sizes_and_ratio() {
    let (service, temp) = create_stub_service(QUARTER_CODEC).await;
    let bitmap = tiny_bitmap();

    let result = service
        .submit(bitmap.clone(), "tiny.bmp", "compress")
        .await
        .expect("compress failed");

    assert!(result.output_filename.starts_with("processed_"));
    assert!(result.output_filename.ends_with(".pp"));
    assert_eq!(result.input_size_bytes, 70);
    assert_eq!(result.output_size_bytes, 17);
    assert_eq!(result.compression_ratio_percent, Some(75.71));
    assert_eq!(result.ratio_display().as_deref(), Some("75.71%"));

    // staged input is gone, only the artifact remains
    assert_eq!(count_files(&temp.path().join("uploads")), 0);
    assert_eq!(count_files(&temp.path().join("outputs")), 1);

    let bytes = service
        .retrieve(&result.output_filename)
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();
    assert_eq!(bytes, bitmap[..17]);
}

#[tokio::test]
async fn round_trip_through_copy_codec_restores_original() {
    let (service, _temp) = create_stub_service(COPY_CODEC).await;
    let bitmap = tiny_bitmap();

    let compressed = service
        .submit(bitmap.clone(), "tiny.bmp", "compress")
        .await
        .unwrap();
    let pp = service
        .retrieve(&compressed.output_filename)
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();

    let decompressed = service.submit(pp, "tiny.pp", "decompress").await.unwrap();
    assert!(decompressed.output_filename.ends_with(".bmp"));
    assert_eq!(decompressed.compression_ratio_percent, None);

    let restored = service
        .retrieve(&decompressed.output_filename)
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();
    assert_eq!(restored, bitmap);
}

#[tokio::test]
async fn failing_codec_surfaces_diagnostics_and_cleans_up() {
    let (service, temp) = create_stub_service(FAILING_CODEC).await;

    let err = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap_err();

    match err {
        Error::ConversionFailed { stderr, stdout, .. } => {
            assert!(stderr.contains("Failed to load image"));
            assert!(stdout.contains("Loading image"));
        }
        other => panic!("expected ConversionFailed, got {:?}", other),
    }
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn silent_exit_zero_without_output_is_a_failure() {
    let (service, temp) = create_stub_service(SILENT_CODEC).await;

    let err = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConversionFailed { .. }));
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn stderr_on_success_is_not_fatal() {
    let (service, _temp) = create_stub_service(NOISY_CODEC).await;

    let result = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap();

    assert_eq!(result.output_size_bytes, 70);
}

#[tokio::test]
async fn hanging_codec_is_killed_at_the_timeout() {
    let (service, temp) = create_stub_service_with(HANGING_CODEC, |config| {
        config.codec.timeout = Duration::from_millis(300);
    })
    .await;

    let started = std::time::Instant::now();
    let err = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConversionTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn timeout_leaves_no_output_from_forked_workers() {
    let (service, temp) = create_stub_service_with(FORKING_CODEC, |config| {
        config.codec.timeout = Duration::from_millis(300);
    })
    .await;

    let err = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConversionTimeout { .. }));
    assert_no_files_left(temp.path());

    // the worker would have written its output one second in
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() {
    let (service, temp) = create_stub_service(COPY_CODEC).await;
    std::fs::remove_file(temp.path().join("codec.sh")).unwrap();

    let err = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CodecLaunch { .. }));
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn concurrent_jobs_get_distinct_artifacts() {
    let (service, temp) = create_stub_service(COPY_CODEC).await;

    let jobs: Vec<_> = (0..20u8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let content = vec![i; 100 + usize::from(i)];
                let result = service
                    .submit(content.clone(), "same-name.bmp", "compress")
                    .await
                    .unwrap();
                (result, content)
            })
        })
        .collect();

    let mut names = HashSet::new();
    for job in jobs {
        let (result, content) = job.await.unwrap();
        assert!(names.insert(result.output_filename.clone()));

        let served = service
            .retrieve(&result.output_filename)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(served, content);
    }

    assert_eq!(names.len(), 20);
    assert_eq!(count_files(&temp.path().join("uploads")), 0);
}

#[tokio::test]
async fn served_artifact_expires_after_grace() {
    let (service, temp) = create_stub_service(COPY_CODEC).await;
    let result = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap();

    let download = service.retrieve(&result.output_filename).await.unwrap();
    assert_eq!(download.len, 70);
    download.read_to_end().await.unwrap();

    assert!(wait_for_expiry(&service, &result.output_filename, Duration::from_secs(5)).await);
    assert!(matches!(
        service.retrieve(&result.output_filename).await,
        Err(Error::NotFound(_))
    ));
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn unclaimed_artifact_expires_after_ttl() {
    let (service, temp) = create_stub_service_with(COPY_CODEC, |config| {
        config.download.unclaimed_ttl = Some(Duration::from_millis(200));
    })
    .await;

    let result = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap();

    assert!(wait_for_expiry(&service, &result.output_filename, Duration::from_secs(5)).await);
    assert_no_files_left(temp.path());
}

#[tokio::test]
async fn events_follow_the_job_lifecycle() {
    let (service, _temp) = create_stub_service(COPY_CODEC).await;
    let mut events = service.subscribe();

    let result = service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap();
    service
        .retrieve(&result.output_filename)
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            Event::JobStarted { .. } => "started",
            Event::JobCompleted { .. } => "completed",
            Event::JobFailed { .. } => "failed",
            Event::ArtifactServed { .. } => "served",
            Event::ArtifactExpired { .. } => "expired",
            Event::Shutdown => "shutdown",
        });
    }
    assert_eq!(kinds, ["started", "completed", "served"]);
}

#[tokio::test]
async fn restart_purges_previous_outputs() {
    let (service, temp) = create_stub_service(COPY_CODEC).await;
    service
        .submit(tiny_bitmap(), "tiny.bmp", "compress")
        .await
        .unwrap();
    assert_eq!(count_files(&temp.path().join("outputs")), 1);

    let config = stub_config(&temp, temp.path().join("codec.sh"));
    drop(service);
    ConversionService::with_default_codec(config).await.unwrap();

    assert_eq!(count_files(&temp.path().join("outputs")), 0);
}
