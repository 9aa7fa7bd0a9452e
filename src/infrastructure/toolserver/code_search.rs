//! Code-hosting search tool server backed by the GitHub REST API.

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

const UPSTREAM_URL: &str = "https://api.github.com";
const DEFAULT_RESULTS: u32 = 3;
const MAX_RESULTS: u32 = 5;

#[derive(Clone)]
pub struct CodeSearchState {
    token: Option<String>,
    http: reqwest::Client,
}

impl CodeSearchState {
    pub fn from_env() -> Self {
        Self::new(env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty()))
    }

    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            http: reqwest::Client::builder()
                .user_agent(concat!("augur/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn credential_present(&self) -> bool {
        self.token.is_some()
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {token}"));
        }
        request
    }
}

pub fn app(state: CodeSearchState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search/repositories", post(search_repositories))
        .route("/search/code", post(search_code))
        .route("/mcp/query", post(mcp_query))
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize)]
struct HomeBody {
    service: &'static str,
    status: &'static str,
    token_present: bool,
}

async fn home(State(state): State<Arc<CodeSearchState>>) -> Json<HomeBody> {
    Json(HomeBody {
        service: "Code Search Tool Server",
        status: "running",
        token_present: state.token.is_some(),
    })
}

async fn search_repositories(
    State(state): State<Arc<CodeSearchState>>,
    Json(payload): Json<QueryEnvelope>,
) -> Result<Json<RepositoryResults>, ErrorReply> {
    run_repository_search(&state, &payload).await
}

async fn search_code(
    State(state): State<Arc<CodeSearchState>>,
    Json(payload): Json<QueryEnvelope>,
) -> Result<Json<CodeResults>, ErrorReply> {
    run_code_search(&state, &payload).await
}

async fn mcp_query(
    State(state): State<Arc<CodeSearchState>>,
    Json(payload): Json<QueryEnvelope>,
) -> Result<Response, ErrorReply> {
    match payload.query_type.as_deref() {
        Some("repository_search") => run_repository_search(&state, &payload)
            .await
            .map(IntoResponse::into_response),
        Some("code_search") => run_code_search(&state, &payload)
            .await
            .map(IntoResponse::into_response),
        _ => Err(error_reply(StatusCode::BAD_REQUEST, "Unsupported query type")),
    }
}

fn result_count(payload: &QueryEnvelope) -> u32 {
    payload.count.unwrap_or(DEFAULT_RESULTS).min(MAX_RESULTS)
}

#[derive(Debug, Serialize)]
struct RepositoryResults {
    results: Vec<RepositoryResult>,
}

#[derive(Debug, Serialize)]
struct RepositoryResult {
    name: String,
    description: String,
    url: String,
    stars: u64,
    forks: u64,
    language: String,
    source: &'static str,
}

async fn run_repository_search(
    state: &CodeSearchState,
    payload: &QueryEnvelope,
) -> Result<Json<RepositoryResults>, ErrorReply> {
    let query = payload
        .query()
        .ok_or_else(|| error_reply(StatusCode::BAD_REQUEST, "Missing query parameter"))?;
    let count = result_count(payload);

    debug!(query, count, "forwarding repository search to GitHub");
    let per_page = count.to_string();
    let response = state
        .get(&format!("{UPSTREAM_URL}/search/repositories"))
        .query(&[
            ("q", query),
            ("sort", "stars"),
            ("per_page", per_page.as_str()),
        ])
        .send()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(upstream_error("GitHub API", status, body));
    }

    let upstream: RepositorySearchResponse = response
        .json()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let results = upstream
        .items
        .into_iter()
        .map(|repo| RepositoryResult {
            name: repo.full_name.unwrap_or_default(),
            description: repo.description.unwrap_or_default(),
            url: repo.html_url.unwrap_or_default(),
            stars: repo.stargazers_count.unwrap_or_default(),
            forks: repo.forks_count.unwrap_or_default(),
            language: repo.language.unwrap_or_default(),
            source: "github_repo",
        })
        .collect::<Vec<_>>();

    info!(query, count = results.len(), "repository search completed");
    Ok(Json(RepositoryResults { results }))
}

#[derive(Debug, Serialize)]
struct CodeResults {
    results: Vec<CodeResult>,
}

#[derive(Debug, Serialize)]
struct CodeResult {
    name: String,
    path: String,
    repository: String,
    url: String,
    source: &'static str,
}

async fn run_code_search(
    state: &CodeSearchState,
    payload: &QueryEnvelope,
) -> Result<Json<CodeResults>, ErrorReply> {
    let query = payload
        .query()
        .ok_or_else(|| error_reply(StatusCode::BAD_REQUEST, "Missing query parameter"))?;
    let count = result_count(payload);

    debug!(query, count, "forwarding code search to GitHub");
    let per_page = count.to_string();
    let response = state
        .get(&format!("{UPSTREAM_URL}/search/code"))
        .query(&[("q", query), ("per_page", per_page.as_str())])
        .send()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(upstream_error("GitHub API", status, body));
    }

    let upstream: CodeSearchResponse = response
        .json()
        .await
        .map_err(|error| error_reply(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let results = upstream
        .items
        .into_iter()
        .map(|item| CodeResult {
            name: item.name.unwrap_or_default(),
            path: item.path.unwrap_or_default(),
            repository: item
                .repository
                .and_then(|repo| repo.full_name)
                .unwrap_or_default(),
            url: item.html_url.unwrap_or_default(),
            source: "github_code",
        })
        .collect::<Vec<_>>();

    info!(query, count = results.len(), "code search completed");
    Ok(Json(CodeResults { results }))
}

#[derive(Debug, Deserialize)]
struct RepositorySearchResponse {
    #[serde(default)]
    items: Vec<RepositoryItem>,
}

#[derive(Debug, Deserialize)]
struct RepositoryItem {
    full_name: Option<String>,
    description: Option<String>,
    html_url: Option<String>,
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeSearchResponse {
    #[serde(default)]
    items: Vec<CodeItem>,
}

#[derive(Debug, Deserialize)]
struct CodeItem {
    name: Option<String>,
    path: Option<String>,
    html_url: Option<String>,
    repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
struct RepositoryRef {
    full_name: Option<String>,
}
