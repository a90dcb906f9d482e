//! REST client for one project's task queue.
//!
//! Wraps the `/api/v1/projects/{project_id}/tasks` endpoints using
//! [`reqwest`].

use crawlq_core::payload::{ColumnarBatch, ResultPayload};
use crawlq_core::record::ClaimedTask;
use crawlq_core::types::DbId;
use reqwest::StatusCode;
use serde::Deserialize;

/// Errors from the queue API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The queue returned a non-2xx status code.
    #[error("Queue API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ClientError {
    /// The server understood the request and refused it (4xx).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if (400..500).contains(status))
    }
}

/// Body of an append response.
#[derive(Debug, Deserialize)]
struct AppendResponse {
    inserted_count: u64,
}

/// Where a failure report left the task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailureAck {
    /// `pending` if the task will be retried, `failed` once it is parked.
    pub status: String,
    pub retry_count: i32,
}

/// HTTP client bound to one project of a queue server.
#[derive(Debug, Clone)]
pub struct TaskClient {
    client: reqwest::Client,
    tasks_url: String,
}

impl TaskClient {
    /// Create a client for `project_id` on the server at `base_url`
    /// (e.g. `http://host:3000`).
    pub fn new(base_url: &str, project_id: DbId) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, project_id)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, project_id: DbId) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client,
            tasks_url: format!("{base_url}/api/v1/projects/{project_id}/tasks"),
        }
    }

    /// (Re)create the task table with `columns`.
    pub async fn define_task_table(&self, columns: &[String]) -> Result<(), ClientError> {
        self.post_columns("/table", columns).await
    }

    /// (Re)create the result table with `columns`.
    pub async fn define_result_table(&self, columns: &[String]) -> Result<(), ClientError> {
        self.post_columns("/results/table", columns).await
    }

    /// Append a columnar batch. Returns the number of tasks inserted.
    pub async fn append_tasks(&self, batch: &ColumnarBatch) -> Result<u64, ClientError> {
        let response = self.client.post(&self.tasks_url).json(batch).send().await?;
        let body: AppendResponse = Self::parse_response(response).await?;
        Ok(body.inserted_count)
    }

    pub async fn task_columns(&self) -> Result<Vec<String>, ClientError> {
        self.get_json("/columns").await
    }

    pub async fn result_columns(&self) -> Result<Vec<String>, ClientError> {
        self.get_json("/results/columns").await
    }

    /// Claim the next task, or `None` when the queue has nothing to hand out.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedTask>, ClientError> {
        let response = self
            .client
            .get(format!("{}/next", self.tasks_url))
            .query(&[("worker_id", worker_id)])
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    pub async fn submit_result(
        &self,
        task_id: DbId,
        payload: &ResultPayload,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/{task_id}/result", self.tasks_url))
            .json(payload)
            .send()
            .await?;

        Self::check_status(response).await
    }

    pub async fn report_failure(
        &self,
        task_id: DbId,
        error: Option<&str>,
    ) -> Result<FailureAck, ClientError> {
        let body = serde_json::json!({ "error": error });
        let response = self
            .client
            .post(format!("{}/{task_id}/fail", self.tasks_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fraction of the project's tasks that are done.
    pub async fn progress(&self) -> Result<f64, ClientError> {
        self.get_json("/progress").await
    }

    pub async fn result_count(&self) -> Result<i64, ClientError> {
        self.get_json("/results/count").await
    }

    // ---- private helpers ----

    async fn post_columns(&self, path: &str, columns: &[String]) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}{path}", self.tasks_url))
            .json(&serde_json::json!({ "columns": columns }))
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .client
            .get(format!("{}{path}", self.tasks_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code, or return a
    /// [`ClientError::ApiError`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
