use super::*;

#[tokio::test]
async fn test_register_returns_accepted_and_job_completes() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let server = MockServer::start().await;
    serve_file(&server, "/maps/sheet.tif", payload(4096)).await;
    let url = format!("{}/maps/sheet.tif", server.uri());

    let response = router_for(&fetcher)
        .oneshot(register_request(&url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let info: ResourceInfo = json_body(response).await;
    assert_eq!(info.url, url);
    assert_eq!(info.state, ResourceState::Downloading);
    assert_eq!(info.total_size_bytes, 4096);

    let info = wait_for_terminal(&fetcher, &url).await;
    assert_eq!(info.state, ResourceState::Ready);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let server = MockServer::start().await;
    serve_file(&server, "/a.tif", payload(100)).await;
    let url = format!("{}/a.tif", server.uri());

    let app = router_for(&fetcher);
    let first = app.clone().oneshot(register_request(&url)).await.unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    wait_for_terminal(&fetcher, &url).await;

    let second = app.oneshot(register_request(&url)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = json_body(second).await;
    assert_eq!(body["error"]["code"], "registration_conflict");
    assert_eq!(body["error"]["details"]["state"], "ready");
}

#[tokio::test]
async fn test_register_without_size_is_service_unavailable() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let server = MockServer::start().await;
    let url = format!("{}/nothing-here.tif", server.uri());

    let response = router_for(&fetcher)
        .oneshot(register_request(&url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "metadata_unavailable");
}

#[tokio::test]
async fn test_register_invalid_url_is_bad_request() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let app = router_for(&fetcher);

    let response = app
        .clone()
        .oneshot(register_request("ftp://example.com/a.tif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_url");

    let response = app.oneshot(register_request("   ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_register_after_shutdown_is_service_unavailable() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    fetcher.shutdown().await.unwrap();

    let response = router_for(&fetcher)
        .oneshot(register_request("https://example.com/a.tif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "shutting_down");
}

#[tokio::test]
async fn test_status_of_registered_file() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let server = MockServer::start().await;
    serve_file(&server, "/s.tif", payload(2048)).await;
    let url = format!("{}/s.tif", server.uri());

    fetcher.register(&url).await.unwrap();
    wait_for_terminal(&fetcher, &url).await;

    let uri = format!("/files/status?url={}", urlencoding::encode(&url));
    let response = router_for(&fetcher).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let info: ResourceInfo = json_body(response).await;
    assert_eq!(info.url, url);
    assert_eq!(info.state, ResourceState::Ready);
    assert_eq!(info.downloaded_bytes, 2048);
    assert_eq!(info.download_fraction, 1.0);
}

#[tokio::test]
async fn test_status_of_unknown_file_is_not_found() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let uri = format!(
        "/files/status?url={}",
        urlencoding::encode("https://example.com/never.tif")
    );
    let response = router_for(&fetcher).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_status_without_url_is_rejected() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;

    let response = router_for(&fetcher)
        .oneshot(get("/files/status"))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_list_files() {
    let (fetcher, _temp_dir) = create_test_fetcher().await;
    let app = router_for(&fetcher);

    let response = app.clone().oneshot(get("/files")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let files: Vec<ResourceInfo> = json_body(response).await;
    assert!(files.is_empty());

    let server = MockServer::start().await;
    serve_file(&server, "/l.tif", payload(64)).await;
    let url = format!("{}/l.tif", server.uri());
    fetcher.register(&url).await.unwrap();
    wait_for_terminal(&fetcher, &url).await;

    let response = app.oneshot(get("/files")).await.unwrap();
    let files: Vec<ResourceInfo> = json_body(response).await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].url, url);
}
