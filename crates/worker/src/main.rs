//! `crawlq-worker` -- reference crawler.
//!
//! Claims tasks from one project, fetches each task's `url` column, and
//! submits what came back to the project's result table. Runs until
//! SIGINT.
//!
//! # Environment variables
//!
//! | Variable             | Required | Default          | Description                        |
//! |----------------------|----------|------------------|------------------------------------|
//! | `API_BASE_URL`       | yes      | --               | Queue server, e.g. `http://host:3000` |
//! | `PROJECT_ID`         | yes      | --               | Project whose tasks to work on     |
//! | `WORKER_ID`          | no       | `crawler-<pid>`  | Identity reported on claims        |
//! | `POLL_INTERVAL_MS`   | no       | `1000`           | Wait between claims when idle      |
//! | `FETCH_TIMEOUT_SECS` | no       | `30`             | Per-request fetch timeout          |

use std::sync::Arc;
use std::time::Duration;

use crawlq_core::types::DbId;
use crawlq_worker::crawler::FetchHandler;
use crawlq_worker::{TaskClient, WorkerLoop};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crawlq_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_base_url = std::env::var("API_BASE_URL").unwrap_or_else(|_| {
        tracing::error!("API_BASE_URL environment variable is required");
        std::process::exit(1);
    });

    let project_id: DbId = std::env::var("PROJECT_ID")
        .unwrap_or_else(|_| {
            tracing::error!("PROJECT_ID environment variable is required");
            std::process::exit(1);
        })
        .parse()
        .unwrap_or_else(|_| {
            tracing::error!("PROJECT_ID must be a valid integer");
            std::process::exit(1);
        });

    let worker_id = std::env::var("WORKER_ID")
        .unwrap_or_else(|_| format!("crawler-{}", std::process::id()));

    let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

    let fetch_timeout_secs: u64 = std::env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

    tracing::info!(
        api_base_url = %api_base_url,
        project_id,
        worker_id = %worker_id,
        poll_interval_ms,
        fetch_timeout_secs,
        "Starting crawlq-worker",
    );

    let client = TaskClient::new(&api_base_url, project_id);

    let result_columns = client.result_columns().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to read the project's result columns");
        std::process::exit(1);
    });
    if result_columns.is_empty() {
        tracing::warn!(project_id, "Result table is not defined; every task will be reported as failed");
    }

    let handler = FetchHandler::new(Duration::from_secs(fetch_timeout_secs), result_columns)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        });

    let worker = WorkerLoop::new(client, Arc::new(handler), worker_id)
        .with_poll_interval(Duration::from_millis(poll_interval_ms));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT (Ctrl-C), stopping after the current task");
        }
        signal_cancel.cancel();
    });

    let stats = worker.run(cancel).await;
    tracing::info!(completed = stats.completed, failed = stats.failed, "Worker stopped");
}
