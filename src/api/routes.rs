//! API Routes
//!
//! Wires the slot cache handlers into an Axum router.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    defrag_handler, delete_handler, get_handler, health_handler, set_handler, stats_handler,
    AppState,
};

/// Builds the router over a shared [`AppState`].
///
/// Requests are traced through `tower_http` and CORS is open to any origin.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cache_routes = Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler));

    let admin_routes = Router::new()
        .route("/stats", get(stats_handler))
        .route("/defrag", post(defrag_handler))
        .route("/health", get(health_handler));

    cache_routes
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StringCache;
    use crate::cache::{CapacityLimits, SlotFileStore, StoreOptions, Utf8Codec};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn app_in(dir: &TempDir) -> Router {
        let store = SlotFileStore::open(
            dir.path().join("routes.dat"),
            Utf8Codec,
            StoreOptions::default(),
        )
        .unwrap();
        let cache = StringCache::new(store, Utf8Codec, CapacityLimits::default(), None);
        create_router(AppState::new(cache))
    }

    async fn status_of(app: &Router, method: Method, uri: &str, json: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match json {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_admin_routes_respond() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir);

        assert_eq!(status_of(&app, Method::GET, "/health", None).await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::GET, "/stats", None).await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::POST, "/defrag", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_get_delete_through_router() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir);

        let set = status_of(
            &app,
            Method::PUT,
            "/set",
            Some(r#"{"key":"slot","value":"filled"}"#),
        )
        .await;
        assert_eq!(set, StatusCode::OK);
        assert_eq!(status_of(&app, Method::GET, "/get/slot", None).await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::DELETE, "/del/slot", None).await, StatusCode::OK);
        assert_eq!(
            status_of(&app, Method::GET, "/get/slot", None).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir);

        assert_eq!(
            status_of(&app, Method::GET, "/defrag", None).await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
