//! End-to-end: worker loop against an in-process queue server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use crawlq_api::config::{ServerConfig, StoreBackend};
use crawlq_api::router::build_app_router;
use crawlq_api::state::AppState;
use crawlq_core::payload::{ColumnarBatch, ResultPayload};
use crawlq_core::policy::QueuePolicy;
use crawlq_core::queue::{MemoryQueueStore, TaskQueue};
use crawlq_core::record::ClaimedTask;
use crawlq_worker::crawler::FetchHandler;
use crawlq_worker::{ClientError, HandlerError, StepOutcome, TaskClient, TaskHandler, WorkerLoop};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Serve `app` on an ephemeral localhost port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Start a queue server over a fresh memory store with one project.
async fn start_queue(settings: Option<serde_json::Value>) -> TaskClient {
    let store = Arc::new(MemoryQueueStore::new());
    let project = store.create_project("e2e", settings).await;

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        store_backend: StoreBackend::Memory,
        database_url: None,
        db_max_connections: 1,
        task_max_retries: 3,
        task_lease_secs: 0,
    };
    let state = AppState {
        queue: Arc::new(TaskQueue::new(store, QueuePolicy::default())),
    };

    let base_url = serve(build_app_router(state, &config)).await;
    TaskClient::new(&base_url, project.id)
}

fn url_batch(urls: &[&str]) -> ColumnarBatch {
    let mut batch = ColumnarBatch::new();
    batch.insert("url".into(), urls.iter().map(|u| json!(u)).collect());
    batch
}

/// Uppercases the URL into `title`; fails any URL containing "bad".
struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    async fn handle(&self, task: &ClaimedTask) -> Result<ResultPayload, HandlerError> {
        let url = task.data["url"].as_str().unwrap_or_default();
        if url.contains("bad") {
            return Err(format!("refusing {url}").into());
        }
        Ok(ResultPayload::from([("title".to_string(), json!(url.to_uppercase()))]))
    }
}

#[tokio::test]
async fn worker_drains_queue_and_reports_failures() {
    let client = start_queue(Some(json!({ "max_retries": 1 }))).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client.define_result_table(&cols(&["title"])).await.unwrap();
    assert_eq!(
        client
            .append_tasks(&url_batch(&["http://a", "http://bad", "http://c"]))
            .await
            .unwrap(),
        3
    );

    let worker = WorkerLoop::new(client.clone(), Arc::new(EchoHandler), "w1".into());
    let stats = worker.run_until_idle().await.unwrap();

    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(client.result_count().await.unwrap(), 2);
    assert_eq!(client.progress().await.unwrap(), 0.6667);
    assert!(client.claim_next("w2").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_task_is_retried_until_the_limit() {
    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client.define_result_table(&cols(&["title"])).await.unwrap();
    client.append_tasks(&url_batch(&["http://bad"])).await.unwrap();

    let worker = WorkerLoop::new(client.clone(), Arc::new(EchoHandler), "w1".into());
    for attempt in 1..=3 {
        let outcome = worker.run_once().await.unwrap();
        assert!(matches!(outcome, StepOutcome::Failed(_)), "attempt {attempt}");
    }
    assert_eq!(worker.run_once().await.unwrap(), StepOutcome::Idle);
}

#[tokio::test]
async fn rejected_result_is_reported_and_the_claim_released() {
    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client.define_result_table(&cols(&["status_code"])).await.unwrap();
    client
        .append_tasks(&url_batch(&["http://a", "http://b"]))
        .await
        .unwrap();

    let worker = WorkerLoop::new(client.clone(), Arc::new(EchoHandler), "w1".into());
    let first = worker.run_once().await.unwrap();
    let StepOutcome::Failed(task_id) = first else {
        panic!("expected a failure report, got {first:?}");
    };

    let retried = client.claim_next("w2").await.unwrap().unwrap();
    assert_eq!(retried.id, task_id);
    assert_eq!(client.progress().await.unwrap(), 0.0);
}

#[tokio::test]
async fn repeat_claim_by_the_same_worker_returns_its_task() {
    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client.append_tasks(&url_batch(&["http://a", "http://b"])).await.unwrap();

    let held = client.claim_next("w1").await.unwrap().unwrap();
    assert_eq!(client.claim_next("w1").await.unwrap(), Some(held.clone()));
    assert_ne!(client.claim_next("w2").await.unwrap().unwrap().id, held.id);
}

#[tokio::test]
async fn run_stops_on_cancel() {
    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client.define_result_table(&cols(&["title"])).await.unwrap();
    client.append_tasks(&url_batch(&["http://a", "http://b"])).await.unwrap();

    let worker = WorkerLoop::new(client.clone(), Arc::new(EchoHandler), "w1".into())
        .with_poll_interval(Duration::from_millis(20));
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while client.progress().await.unwrap() < 1.0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("worker should finish both tasks");

    cancel.cancel();
    let stats = handle.await.unwrap();
    assert_eq!(stats.completed, 2);
}

#[tokio::test]
async fn api_errors_surface_status_and_body() {
    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();

    let mut batch = ColumnarBatch::new();
    batch.insert("depth".into(), vec![json!(1)]);
    let err = client.append_tasks(&batch).await.unwrap_err();

    match err {
        ClientError::ApiError { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("SCHEMA_MISMATCH"), "{body}");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_handler_crawls_a_live_page() {
    let site = serve(Router::new().route(
        "/page",
        get(|| async { Html("<html><head><title>Hello  Crawler</title></head></html>") }),
    ))
    .await;

    let client = start_queue(None).await;
    client.define_task_table(&cols(&["url"])).await.unwrap();
    client
        .define_result_table(&cols(&["title", "status_code"]))
        .await
        .unwrap();
    let page = format!("{site}/page");
    let missing = format!("{site}/missing");
    client
        .append_tasks(&url_batch(&[page.as_str(), missing.as_str()]))
        .await
        .unwrap();

    let handler = FetchHandler::new(
        Duration::from_secs(5),
        client.result_columns().await.unwrap(),
    )
    .unwrap();
    let worker = WorkerLoop::new(client.clone(), Arc::new(handler), "crawler".into());

    assert!(matches!(worker.run_once().await.unwrap(), StepOutcome::Completed(_)));
    assert!(matches!(worker.run_once().await.unwrap(), StepOutcome::Failed(_)));
    assert_eq!(client.result_count().await.unwrap(), 1);
}
