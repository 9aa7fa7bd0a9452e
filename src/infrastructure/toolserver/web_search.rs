//! Web-search tool server backed by the Brave Search API.

use super::{ErrorReply, QueryEnvelope, error_reply, upstream_error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tracing::{debug, info};

const UPSTREAM_URL: &str = "https://api.search.brave.com/res/v1/search";
const MAX_RESULTS: usize = 3;

#[derive(Clone)]
pub struct WebSearchState {
    api_key: Option<String>,
    http: reqwest::Client,
}

impl WebSearchState {
    pub fn from_env() -> Self {
        Self::new(env::var("BRAVE_API_KEY").ok().filter(|key| !key.is_empty()))
    }

    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::builder()
                .user_agent(concat!("augur/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn credential_present(&self) -> bool {
        self.api_key.is_some()
    }
}

pub fn app(state: WebSearchState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", post(search))
        .route("/mcp/query", post(mcp_query))
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize)]
struct HomeBody {
    service: &'static str,
    status: &'static str,
    api_key_present: bool,
}

async fn home(State(state): State<Arc<WebSearchState>>) -> Json<HomeBody> {
    Json(HomeBody {
        service: "Web Search Tool Server",
        status: "running",
        api_key_present: state.api_key.is_some(),
    })
}

#[derive(Debug, Serialize)]
struct SearchResults {
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    title: String,
    description: String,
    url: String,
    source: &'static str,
}

async fn search(
    State(state): State<Arc<WebSearchState>>,
    Json(payload): Json<QueryEnvelope>,
) -> Result<Json<SearchResults>, ErrorReply> {
    run_search(&state, &payload).await
}

async fn mcp_query(
    State(state): State<Arc<WebSearchState>>,
    Json(payload): Json<QueryEnvelope>,
) -> Result<Response, ErrorReply> {
    match payload.query_type.as_deref() {
        Some("search") => run_search(&state, &payload)
            .await
            .map(IntoResponse::into_response),
        _ => Err(error_reply(StatusCode::BAD_REQUEST, "Unsupported query type")),
    }
}

async fn run_search(
    state: &WebSearchState,
    payload: &QueryEnvelope,
) -> Result<Json<SearchResults>, ErrorReply> {
    let query = payload
        .query()
        .ok_or_else(|| error_reply(StatusCode::BAD_REQUEST, "Missing query parameter"))?;

    let api_key = state.api_key.as_deref().ok_or_else(|| {
        error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "BRAVE_API_KEY is not set. Please configure the environment variable.",
        )
    })?;

    debug!(query, "forwarding search to Brave");
    let response = state
        .http
        .get(UPSTREAM_URL)
        .header("X-Subscription-Token", api_key)
        .query(&[
            ("q", query),
            ("source", "web"),
            ("count", "3"),
        ])
        .send()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(upstream_error("Brave Search API", status, body));
    }

    let upstream: BraveResponse = response
        .json()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let results = upstream
        .web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .take(MAX_RESULTS)
        .map(|result| SearchResult {
            title: result.title.unwrap_or_default(),
            description: result
                .description
                .or(result.text)
                .unwrap_or_default(),
            url: result.url.unwrap_or_default(),
            source: "brave_search",
        })
        .collect::<Vec<_>>();

    info!(query, count = results.len(), "search completed");
    Ok(Json(SearchResults { results }))
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: Option<String>,
    description: Option<String>,
    text: Option<String>,
    url: Option<String>,
}
