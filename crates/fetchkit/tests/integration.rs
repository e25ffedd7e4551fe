//! End to end tests driving the engine over HTTP against mockito

use std::sync::Arc;
use std::time::Duration;

use fetchkit::config::{resolve, CachePolicy, CallArgs, Options, ProviderContext};
use fetchkit::data::Data;
use fetchkit::error::Error;
use fetchkit::fetch::Fetch;
use fetchkit::request::{BodyArg, RouteOrBody};
use fetchkit::storage::MemoryStorage;
use fetchkit::view::ResponseLike;
use fetchkit::Method;
use serde_json::json;

fn engine(server: &mockito::Server, options: Options) -> Fetch {
    let provider = ProviderContext::new(server.url());
    let config = resolve(&provider, &CallArgs::from(options)).expect("valid configuration");
    Fetch::new(config)
}

#[tokio::test]
async fn test_get_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1}, {"id": 2}]"#)
        .expect(1)
        .create_async()
        .await;

    let fetch = engine(&server, Options::new());
    let data = fetch
        .request(Method::Get, Some(RouteOrBody::from("/users")), None)
        .await
        .expect("request");

    assert_eq!(data, Some(Data::Json(json!([{"id": 1}, {"id": 2}]))));
    assert_eq!(fetch.error(), None);
    assert_eq!(fetch.response().status(), Some(200));

    // Served from cache
    fetch
        .request(Method::Get, Some(RouteOrBody::from("/users")), None)
        .await
        .expect("request");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/widgets")
        .match_header("content-type", "application/json")
        .match_header("x-client", "fetchkit")
        .match_body(mockito::Matcher::Json(json!({"name": "x"})))
        .with_status(201)
        .with_body(r#"{"id": 7}"#)
        .create_async()
        .await;

    let fetch = engine(&server, Options::new().header("X-Client", "fetchkit"));
    let data = fetch
        .request(
            Method::Post,
            Some(RouteOrBody::from("/widgets")),
            Some(BodyArg::Json(json!({"name": "x"}))),
        )
        .await
        .expect("request");

    assert_eq!(data, Some(Data::Json(json!({"id": 7}))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_retries_server_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .with_body("unavailable")
        .expect(3)
        .create_async()
        .await;

    let fetch = engine(
        &server,
        Options::new()
            .path("/flaky")
            .cache_policy(CachePolicy::NoCache)
            .retries(2)
            .retry_delay(Duration::ZERO)
            .retry_on(vec![503]),
    );
    let data = fetch.request(Method::Get, None, None).await.expect("request");

    assert_eq!(data, Some(Data::from("unavailable")));
    assert!(matches!(fetch.error(), Some(Error::Status { status: 503, .. })));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_persisted_cache_across_engines() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/profile")
        .with_status(200)
        .with_body(r#"{"name": "ada"}"#)
        .expect(1)
        .create_async()
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let provider = ProviderContext::new(server.url());
    let config = resolve(
        &provider,
        &CallArgs::from(Options::new().path("/profile").persist(true)),
    )
    .expect("config");

    for _ in 0..2 {
        let fetch = Fetch::builder(config.clone()).storage(storage.clone()).build();
        let data = fetch.request(Method::Get, None, None).await.expect("request");
        assert_eq!(data, Some(Data::Json(json!({"name": "ada"}))));
    }

    mock.assert_async().await;
}
