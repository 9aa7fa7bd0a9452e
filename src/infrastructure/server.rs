use crate::application::orchestrator::Orchestrator;
use crate::application::supervisor::{ProcessSupervisor, SupervisorError, ToolStatus};
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub struct ServerState {
    supervisor: Arc<ProcessSupervisor>,
    orchestrator: Arc<Orchestrator>,
}

impl ServerState {
    pub fn new(supervisor: Arc<ProcessSupervisor>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            supervisor,
            orchestrator,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        ask_handler,
        models_handler,
        tools_handler,
        tool_start_handler,
        tool_stop_handler
    ),
    components(
        schemas(
            AskRequest,
            AskResponse,
            ErrorResponse,
            ModelListResponse,
            ModelEntry,
            ToolListResponse,
            ToolStatusResponse
        )
    ),
    tags(
        (name = "ask", description = "Prompt answering with tool-server context"),
        (name = "models", description = "Selectable LLM providers"),
        (name = "tools", description = "Tool-server lifecycle management")
    )
)]
struct ApiDoc;

pub async fn serve(state: ServerState, addr: SocketAddr) -> Result<(), ServerError> {
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(state);
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/ask", post(ask_handler))
        .route("/models", get(models_handler))
        .route("/tools", get(tools_handler))
        .route("/tools/{name}/start", post(tool_start_handler))
        .route("/tools/{name}/stop", post(tool_stop_handler))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize, ToSchema)]
struct AskRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct AskResponse {
    model: String,
    answer: String,
    full_prompt: String,
}

#[utoipa::path(
    post,
    path = "/ask",
    tag = "ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Prompt answered", body = AskResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Unknown model", body = ErrorResponse)
    )
)]
async fn ask_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(model = payload.model.as_str(), "Received /ask request");

    if payload.prompt.trim().is_empty() {
        error!("Rejecting /ask request due to empty prompt");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt cannot be empty".to_string(),
            }),
        ));
    }
    if !state.orchestrator.providers().contains(&payload.model) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown model '{}'", payload.model),
            }),
        ));
    }

    let answer = state
        .orchestrator
        .answer(&payload.model, &payload.prompt)
        .await;
    Ok(Json(AskResponse {
        model: answer.model,
        answer: answer.content,
        full_prompt: answer.full_prompt,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
struct ModelEntry {
    key: String,
    label: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct ModelListResponse {
    models: Vec<ModelEntry>,
}

#[utoipa::path(
    get,
    path = "/models",
    tag = "models",
    responses(
        (status = 200, description = "Selectable providers", body = ModelListResponse)
    )
)]
async fn models_handler(State(state): State<Arc<ServerState>>) -> Json<ModelListResponse> {
    let models = state
        .orchestrator
        .providers()
        .available()
        .into_iter()
        .map(|(key, label)| ModelEntry { key, label })
        .collect();
    Json(ModelListResponse { models })
}

#[derive(Debug, Serialize, ToSchema)]
struct ToolStatusResponse {
    name: String,
    state: String,
    pid: Option<u32>,
    port: u16,
    last_health: Option<String>,
}

impl From<ToolStatus> for ToolStatusResponse {
    fn from(status: ToolStatus) -> Self {
        Self {
            name: status.name,
            state: status.state.as_str().to_string(),
            pid: status.pid,
            port: status.port,
            last_health: status.last_health.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ToolListResponse {
    tools: Vec<ToolStatusResponse>,
}

#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    responses(
        (status = 200, description = "Status of every configured tool", body = ToolListResponse)
    )
)]
async fn tools_handler(State(state): State<Arc<ServerState>>) -> Json<ToolListResponse> {
    let tools = state
        .supervisor
        .statuses()
        .await
        .into_iter()
        .map(ToolStatusResponse::from)
        .collect();
    Json(ToolListResponse { tools })
}

#[utoipa::path(
    post,
    path = "/tools/{name}/start",
    tag = "tools",
    params(("name" = String, Path, description = "Configured tool name")),
    responses(
        (status = 200, description = "Tool started (or already running)", body = ToolStatusResponse),
        (status = 404, description = "Unknown tool", body = ErrorResponse),
        (status = 502, description = "Start failed", body = ErrorResponse)
    )
)]
async fn tool_start_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<ToolStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(tool = name.as_str(), "Received start request");
    state
        .supervisor
        .start(&name)
        .await
        .map(|status| Json(ToolStatusResponse::from(status)))
        .map_err(supervisor_error_reply)
}

#[utoipa::path(
    post,
    path = "/tools/{name}/stop",
    tag = "tools",
    params(("name" = String, Path, description = "Configured tool name")),
    responses(
        (status = 200, description = "Tool stopped (or already stopped)", body = ToolStatusResponse),
        (status = 404, description = "Unknown tool", body = ErrorResponse),
        (status = 502, description = "Stop failed", body = ErrorResponse)
    )
)]
async fn tool_stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<ToolStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(tool = name.as_str(), "Received stop request");
    state
        .supervisor
        .stop(&name)
        .await
        .map(|status| Json(ToolStatusResponse::from(status)))
        .map_err(supervisor_error_reply)
}

fn supervisor_error_reply(error: SupervisorError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        SupervisorError::UnknownTool { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    error!(%error, "tool lifecycle request failed");
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}
