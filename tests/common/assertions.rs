//! Custom test assertions for end-to-end tests

use ppconv::{ConversionService, Event};
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

/// Number of regular files under `dir` (0 if it does not exist)
pub fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Assert that no job left anything behind in either directory
pub fn assert_no_files_left(temp: &Path) {
    let uploads = count_files(&temp.join("uploads"));
    let outputs = count_files(&temp.join("outputs"));
    assert_eq!(
        (uploads, outputs),
        (0, 0),
        "expected empty directories, found {} upload(s) and {} output(s)",
        uploads,
        outputs
    );
}

/// Wait until `filename` has been deleted by the download gate
///
/// Returns false if the `ArtifactExpired` event does not arrive in time.
pub async fn wait_for_expiry(service: &ConversionService, filename: &str, timeout: Duration) -> bool {
    let mut events = service.subscribe();
    if !service.is_downloadable(filename) {
        return true;
    }

    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::ArtifactExpired { filename: expired }) if expired == filename => {
                    return true;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}
