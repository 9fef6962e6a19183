//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against a real
//! slot file in a temporary directory.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use slot_cache::{api::create_router, AppState, Config};
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

fn test_config(dir: &TempDir) -> Config {
    Config {
        directory: dir.path().to_path_buf(),
        file_name: "api.dat".to_string(),
        max_entries: 100,
        default_ttl: 300,
        ..Config::default()
    }
}

fn create_test_app(config: &Config) -> (Router, AppState) {
    let state = AppState::from_config(config).unwrap();
    (create_router(state.clone()), state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/set")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// == SET / GET ==

#[tokio::test]
async fn test_set_then_get() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    let response = app
        .clone()
        .oneshot(set_request(r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));

    let response = app.oneshot(get_request("/get/test_key")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "test_key");
    assert_eq!(json["value"], "test_value");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    let response = app.oneshot(get_request("/get/nonexistent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

// == DELETE ==

#[tokio::test]
async fn test_delete_endpoint() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    app.clone()
        .oneshot(set_request(r#"{"key":"gone","value":"soon"}"#))
        .await
        .unwrap();

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/del/gone")
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get_request("/get/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == STATS / DEFRAG ==

#[tokio::test]
async fn test_stats_track_lost_space_and_defrag_reclaims_it() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    app.clone()
        .oneshot(set_request(r#"{"key":"a","value":"0123456789"}"#))
        .await
        .unwrap();
    app.clone()
        .oneshot(set_request(r#"{"key":"a","value":"0123456789abcdef"}"#))
        .await
        .unwrap();

    let response = app.clone().oneshot(get_request("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["lost_space"], 11 + 21);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/defrag")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["slots_dropped"], 1);

    let response = app.oneshot(get_request("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["lost_space"], 0);
    assert_eq!(json["file_len"], 21 + 17);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

// == Error Handling ==

#[tokio::test]
async fn test_invalid_json_request() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    let response = app.oneshot(set_request("not json")).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let dir = TempDir::new().unwrap();
    let (app, _) = create_test_app(&test_config(&dir));

    let response = app
        .oneshot(set_request(r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_closed_cache_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let (app, state) = create_test_app(&test_config(&dir));

    state.cache.close().unwrap();

    let response = app.oneshot(get_request("/get/any")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// == Persistence ==

#[tokio::test]
async fn test_values_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    {
        let (app, state) = create_test_app(&config);
        app.oneshot(set_request(r#"{"key":"durable","value":"yes"}"#))
            .await
            .unwrap();
        state.cache.close().unwrap();
    }

    let (app, _) = create_test_app(&config);
    let response = app.oneshot(get_request("/get/durable")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "yes");
}
