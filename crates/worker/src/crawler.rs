//! Stock crawler handler: fetch the task's URL and report what came back.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use crawlq_core::payload::ResultPayload;
use crawlq_core::record::ClaimedTask;
use regex::Regex;
use serde_json::Value;

use crate::handler::{HandlerError, TaskHandler};

/// Task column holding the address to fetch.
pub const DEFAULT_URL_COLUMN: &str = "url";

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid")
});

/// Fetches `task.data[url_column]` and fills whichever of these result
/// columns the project defines: `url`, `status_code`, `content_type`,
/// `content_length`, `title`, `body`.
pub struct FetchHandler {
    client: reqwest::Client,
    url_column: String,
    result_columns: Vec<String>,
}

impl FetchHandler {
    pub fn new(
        fetch_timeout: Duration,
        result_columns: Vec<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            client,
            url_column: DEFAULT_URL_COLUMN.to_string(),
            result_columns,
        })
    }

    pub fn with_url_column(mut self, url_column: impl Into<String>) -> Self {
        self.url_column = url_column.into();
        self
    }

    fn target_url<'a>(&self, task: &'a ClaimedTask) -> Result<&'a str, HandlerError> {
        match task.data.get(&self.url_column) {
            Some(Value::String(url)) if !url.trim().is_empty() => Ok(url.as_str()),
            _ => Err(format!("Task {} has no '{}' to fetch", task.id, self.url_column).into()),
        }
    }

    /// Keep only the fields the result schema defines.
    fn project(&self, fields: Vec<(&str, Value)>) -> ResultPayload {
        fields
            .into_iter()
            .filter(|(name, _)| self.result_columns.iter().any(|c| c.as_str() == *name))
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// Contents of the first `<title>` element, whitespace-collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[async_trait]
impl TaskHandler for FetchHandler {
    async fn handle(&self, task: &ClaimedTask) -> Result<ResultPayload, HandlerError> {
        let url = self.target_url(task)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status} from {url}").into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        tracing::debug!(task_id = task.id, url, status = status.as_u16(), bytes = body.len(), "Fetched");

        Ok(self.project(vec![
            ("url", Value::from(url)),
            ("status_code", Value::from(status.as_u16())),
            ("content_type", content_type.map_or(Value::Null, Value::from)),
            ("content_length", Value::from(body.len())),
            ("title", extract_title(&body).map_or(Value::Null, Value::from)),
            ("body", Value::from(body)),
        ]))
    }
}
