use super::*;
use crate::fetcher::test_helpers::{ScriptedTransformer, payload, serve_file, wait_for_terminal};
use crate::types::{ResourceInfo, ResourceState};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::MockServer;

mod files;

/// Helper to create a test CogFetcher instance wrapped in Arc
async fn create_test_fetcher() -> (Arc<CogFetcher>, tempfile::TempDir) {
    let (fetcher, temp_dir) =
        crate::fetcher::test_helpers::create_test_fetcher(ScriptedTransformer::succeeding()).await;
    (Arc::new(fetcher), temp_dir)
}

fn router_for(fetcher: &Arc<CogFetcher>) -> Router {
    create_router(fetcher.clone(), fetcher.get_config())
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn register_request(url: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/files")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "url": url }).to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let mut config = (*fetcher.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let fetcher = fetcher.clone();
        let config = config.clone();
        async move { start_api_server(fetcher, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown_signal() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let mut config = (*fetcher.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn(start_api_server_with_shutdown(fetcher, config, async move {
        rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let mut config = (*fetcher.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(fetcher, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let mut config = (*fetcher.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(fetcher, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let mut config = (*fetcher.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["http://maps.example.com".to_string()];
    let app = create_router(fetcher, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://maps.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://maps.example.com"
    );
}
