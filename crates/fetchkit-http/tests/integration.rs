//! Integration tests for fetchkit-http using mockito

use std::time::Duration;

use fetchkit_http::{
    AbortController, Body, FormData, Headers, HttpClient, HttpError, Method, RequestOptions,
    Transport, UrlSearchParams,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct TestResponse {
    success: bool,
    data: String,
}

// === GET ===

#[tokio::test]
async fn test_fetch_success() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": "hello"}"#)
        .create_async()
        .await;

    let client = HttpClient::new();
    let url = format!("{}/api/data", server.url());
    let response = client
        .fetch(&url, &RequestOptions::new(Method::Get))
        .await
        .expect("Fetch should succeed");

    assert_eq!(response.status(), 200);
    assert!(response.ok());
    assert_eq!(response.status_text(), "OK");
    assert_eq!(response.headers().get("Content-Type"), Some("application/json"));
    assert!(!response.redirected());

    let body: TestResponse = response.json().expect("JSON body");
    assert_eq!(
        body,
        TestResponse {
            success: true,
            data: "hello".to_string()
        }
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_error_status_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/error")
        .with_status(404)
        .with_body("Not Found")
        .create_async()
        .await;

    let client = HttpClient::new();
    let url = format!("{}/api/error", server.url());
    let response = client
        .fetch(&url, &RequestOptions::new(Method::Get))
        .await
        .expect("Non-2xx responses resolve");

    assert_eq!(response.status(), 404);
    assert!(!response.ok());
    assert!(response.is_client_error());
    assert_eq!(response.text().expect("text body"), "Not Found");

    mock.assert_async().await;
}

// === Bodies and headers ===

#[tokio::test]
async fn test_post_text_body_with_headers() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/submit")
        .match_header("content-type", "application/json")
        .match_header("x-trace", "abc")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "name": "test",
            "value": 42
        })))
        .with_status(201)
        .with_body(r#"{"success": true, "data": "received"}"#)
        .create_async()
        .await;

    let client = HttpClient::new();
    let url = format!("{}/api/submit", server.url());
    let options = RequestOptions::new(Method::Post)
        .with_headers(
            Headers::new()
                .with("Content-Type", "application/json")
                .with("X-Trace", "abc"),
        )
        .with_body(Body::Text(r#"{"name":"test","value":42}"#.to_string()));

    let response = client.fetch(&url, &options).await.expect("POST should succeed");
    assert_eq!(response.status(), 201);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_params_body_is_form_encoded() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("PUT", "/api/form")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("application/x-www-form-urlencoded".to_string()),
        )
        .match_body("a=1&b=two")
        .with_status(200)
        .create_async()
        .await;

    let params: UrlSearchParams = [("a", "1"), ("b", "two")].into_iter().collect();
    let client = HttpClient::new();
    let url = format!("{}/api/form", server.url());
    let options = RequestOptions::new(Method::Put).with_body(Body::Params(params));

    client.fetch(&url, &options).await.expect("PUT should succeed");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_form_data_body_is_multipart() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/upload")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("multipart/form-data".to_string()),
        )
        .with_status(200)
        .create_async()
        .await;

    let client = HttpClient::new();
    let url = format!("{}/api/upload", server.url());
    let options =
        RequestOptions::new(Method::Post).with_body(Body::Form(FormData::new().with("name", "x")));

    client.fetch(&url, &options).await.expect("upload should succeed");

    mock.assert_async().await;
}

// === Cancellation ===

#[tokio::test]
async fn test_aborted_before_send() {
    let server = mockito::Server::new_async().await;

    let controller = AbortController::new();
    controller.abort();

    let client = HttpClient::new();
    let url = format!("{}/never", server.url());
    let options = RequestOptions::new(Method::Get).with_signal(controller.signal());

    let result = client.fetch(&url, &options).await;
    assert_eq!(result, Err(HttpError::Aborted));
}

#[tokio::test]
async fn test_abort_resolves_promptly() {
    // A listener that accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let controller = AbortController::new();
    let options = RequestOptions::new(Method::Get).with_signal(controller.signal());

    let aborter = controller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        aborter.abort();
    });

    let client = HttpClient::new();
    let url = format!("http://{addr}/slow");
    let result = tokio::time::timeout(Duration::from_secs(5), client.fetch(&url, &options))
        .await
        .expect("abort should resolve the request before the guard timeout");

    assert_eq!(result, Err(HttpError::Aborted));
}

// === Connection errors ===

#[tokio::test]
async fn test_connection_refused() {
    let client = HttpClient::new();
    let result = client
        .fetch("http://127.0.0.1:1/", &RequestOptions::new(Method::Get))
        .await;

    assert!(matches!(
        result,
        Err(HttpError::Connection(_)) | Err(HttpError::Other(_))
    ));
}
