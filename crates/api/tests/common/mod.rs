#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use crawlq_core::policy::QueuePolicy;
use crawlq_core::queue::{MemoryQueueStore, TaskQueue};
use crawlq_core::types::DbId;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crawlq_api::config::{ServerConfig, StoreBackend};
use crawlq_api::router::build_app_router;
use crawlq_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        database_url: None,
        db_max_connections: 20,
        task_max_retries: 3,
        task_lease_secs: 0,
    }
}

/// A memory store with one active project, plus its id.
pub async fn test_store() -> (Arc<MemoryQueueStore>, DbId) {
    let store = Arc::new(MemoryQueueStore::new());
    let project = store.create_project("test", None).await;
    (store, project.id)
}

/// Build the full application router over `store`, with the same middleware
/// stack production uses.
pub fn build_test_app(store: Arc<MemoryQueueStore>) -> Router {
    let config = test_config();
    let state = AppState {
        queue: Arc::new(TaskQueue::new(store, QueuePolicy::default())),
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
