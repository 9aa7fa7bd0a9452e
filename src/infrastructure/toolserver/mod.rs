//! The auxiliary tool servers: small local HTTP services that answer
//! search-style queries for the context pipeline.

pub mod code_search;
pub mod web_search;

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Error)]
pub enum ToolServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Request body accepted by both the plain search routes and the generic
/// `/mcp/query` envelope.
#[derive(Debug, Default, Deserialize)]
pub struct QueryEnvelope {
    #[serde(rename = "type")]
    pub query_type: Option<String>,
    pub query: Option<String>,
    pub count: Option<u32>,
}

impl QueryEnvelope {
    /// The query string, rejecting missing or blank values.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

pub(crate) type ErrorReply = (StatusCode, Json<ErrorBody>);

pub(crate) fn error_reply(status: StatusCode, error: impl Into<String>) -> ErrorReply {
    (status, Json(ErrorBody::new(error)))
}

/// Map an upstream non-success status onto our own reply, mirroring the
/// upstream code where it is a valid HTTP status.
pub(crate) fn upstream_error(service: &str, status: reqwest::StatusCode, body: String) -> ErrorReply {
    let mapped = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        mapped,
        Json(ErrorBody::with_message(
            format!("{service} returned status code {}", status.as_u16()),
            body,
        )),
    )
}

pub async fn serve(router: axum::Router, addr: SocketAddr) -> Result<(), ToolServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ToolServerError::Bind { addr, source })?;
    info!(%addr, "tool server ready to accept connections");
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(ToolServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_is_rejected() {
        let envelope = QueryEnvelope {
            query_type: None,
            query: Some("   ".to_string()),
            count: None,
        };
        assert!(envelope.query().is_none());
    }

    #[test]
    fn error_body_omits_absent_message() {
        let body = serde_json::to_value(ErrorBody::new("nope")).expect("serialize");
        assert_eq!(body, serde_json::json!({"error": "nope"}));
    }
}
