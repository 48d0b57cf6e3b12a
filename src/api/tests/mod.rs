use super::*;
use crate::codec::CopyCodec;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


const BOUNDARY: &str = "ppconv-test-boundary";

/// Config rooted in a temp dir with a short download grace
fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = temp.path().join("uploads");
    config.storage.output_dir = temp.path().join("outputs");
    config.download.expiry_grace = Duration::from_millis(100);
    config.download.unclaimed_ttl = None;
    config
}

/// Service backed by the copy codec, wrapped in Arc
async fn create_test_service(config: Config) -> Arc<ConversionService> {
    Arc::new(
        ConversionService::new(config, Arc::new(CopyCodec::new()))
            .await
            .unwrap(),
    )
}

/// Router plus the service behind it
async fn test_app() -> (Router, Arc<ConversionService>, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let service = create_test_service(config.clone()).await;
    let app = create_router(service.clone(), Arc::new(config));
    (app, service, temp)
}

/// One multipart field: (name, filename, content)
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn process_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    // Port 0 = OS assigns a free port
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let service = create_test_service(config.clone()).await;

    let api_handle = tokio::spawn({
        let service = service.clone();
        let config = Arc::new(config);
        async move { start_api_server(service, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let (app, _service, _temp) = test_app().await;

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_cors_rejects_other_origins() {
    let (app, _service, _temp) = test_app().await;

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.api.cors_enabled = false;
    let service = create_test_service(config.clone()).await;
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_swagger_ui_can_be_disabled() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.api.swagger_ui = false;
    let service = create_test_service(config.clone()).await;
    let app = create_router(service, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
