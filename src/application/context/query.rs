use crate::application::supervisor::ToolDirectory;
use crate::config::ToolDescriptor;
use crate::domain::types::ContextItem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A tool's contribution is capped regardless of how much it returns.
pub const MAX_ITEMS_PER_TOOL: usize = 3;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("tool server '{tool}' is not running")]
    ToolNotRunning { tool: String },
    #[error("tool server '{tool}' is unreachable: {detail}")]
    ToolUnavailable { tool: String, detail: String },
    #[error("tool server '{tool}' returned an error: {detail}")]
    ToolError { tool: String, detail: String },
}

#[derive(Debug, Serialize)]
struct QueryPayload<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<RawItem>,
}

/// One raw result as returned by a tool server. Shapes differ per tool
/// (web results carry `title`, code-hosting results carry `name`), so the
/// fields are normalized here.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default, alias = "name")]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Issues one query request to one running tool server under a deadline.
/// No retries: a failed attempt is reported immediately and retry policy,
/// if any, belongs to the caller.
pub struct ToolQueryClient {
    directory: Arc<dyn ToolDirectory>,
    http: reqwest::Client,
}

impl ToolQueryClient {
    pub fn new(directory: Arc<dyn ToolDirectory>) -> Self {
        Self {
            directory,
            http: reqwest::Client::new(),
        }
    }

    pub async fn query(
        &self,
        tool: &str,
        prompt: &str,
        deadline: Duration,
    ) -> Result<Vec<ContextItem>, QueryError> {
        let descriptor =
            self.directory
                .find_running(tool)
                .await
                .ok_or_else(|| QueryError::ToolNotRunning {
                    tool: tool.to_string(),
                })?;
        self.fetch(&descriptor, prompt, deadline).await
    }

    async fn fetch(
        &self,
        descriptor: &ToolDescriptor,
        prompt: &str,
        deadline: Duration,
    ) -> Result<Vec<ContextItem>, QueryError> {
        let url = descriptor.query_url();
        debug!(tool = descriptor.name.as_str(), url = url.as_str(), "querying tool server");

        let response = self
            .http
            .post(&url)
            .timeout(deadline)
            .json(&QueryPayload { query: prompt })
            .send()
            .await
            .map_err(|source| classify_transport(&descriptor.name, source))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("status {status}"));
            return Err(QueryError::ToolError {
                tool: descriptor.name.clone(),
                detail,
            });
        }

        let payload: QueryResponse =
            response
                .json()
                .await
                .map_err(|source| QueryError::ToolError {
                    tool: descriptor.name.clone(),
                    detail: format!("invalid response body: {source}"),
                })?;

        Ok(payload
            .results
            .into_iter()
            .take(MAX_ITEMS_PER_TOOL)
            .map(|raw| ContextItem {
                tool: descriptor.name.clone(),
                title: raw.title,
                body: raw.description,
                url: raw.url,
                source: raw.source.unwrap_or_else(|| descriptor.name.clone()),
            })
            .collect())
    }
}

fn classify_transport(tool: &str, source: reqwest::Error) -> QueryError {
    if source.is_timeout() || source.is_connect() {
        QueryError::ToolUnavailable {
            tool: tool.to_string(),
            detail: source.to_string(),
        }
    } else {
        QueryError::ToolError {
            tool: tool.to_string(),
            detail: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_name_alias_and_missing_fields() {
        let raw: QueryResponse = serde_json::from_str(
            r#"{"results": [
                {"name": "owner/repo", "url": "https://example.test/repo", "source": "github_repo"},
                {"title": "T", "description": "D", "url": "U"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(raw.results.len(), 2);
        assert_eq!(raw.results[0].title, "owner/repo");
        assert_eq!(raw.results[0].description, "");
        assert_eq!(raw.results[1].title, "T");
        assert!(raw.results[1].source.is_none());
    }

    #[test]
    fn missing_results_field_parses_as_empty() {
        let raw: QueryResponse = serde_json::from_str("{}").expect("parse");
        assert!(raw.results.is_empty());
    }
}
