// SPDX-License-Identifier: MIT

//! HTTP start/poll surface over the [`WorkflowRegistry`]

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::error::{FlowError, RegistryError};
use crate::settings::Settings;
use crate::workflow::{ExecutionRecord, ExecutionStatus, WorkflowRegistry};

/// Smallest request body accepted regardless of the document limit
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Body of `GET /api/v1/workflow/{id}/status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Merged state, only once the execution is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionRecord> for StatusResponse {
    fn from(record: ExecutionRecord) -> Self {
        let result = record.status.is_terminal().then(|| record.state.to_json());
        Self {
            workflow_id: record.workflow_id,
            status: record.status,
            progress: record.progress,
            current_stage: record.current_stage,
            created_at: record.created_at,
            updated_at: record.updated_at,
            result,
            error: record.error,
        }
    }
}

/// Workflow routes, mounted both at the root and under `/api/v1`
fn routes() -> Router<WorkflowRegistry> {
    Router::new()
        .route("/health", get(health_check))
        .route("/workflow", post(start_workflow))
        .route("/workflow/", post(start_workflow))
        .route("/workflow/{id}/status", get(workflow_status))
}

/// Build the API router for `registry`
pub fn router(registry: WorkflowRegistry) -> Router {
    // Leaves room for the other request fields; oversized documents are
    // rejected by the registry with a 413.
    let body_limit = registry
        .limits()
        .max_document_bytes
        .saturating_mul(2)
        .max(MIN_BODY_LIMIT);

    Router::new()
        .merge(routes())
        .nest("/api/v1", routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

/// Serve the API until Ctrl-C, then cancel outstanding executions
pub async fn serve(settings: &Settings, registry: WorkflowRegistry) -> Result<(), FlowError> {
    let app = router(registry.clone());
    let addr = settings.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    registry.shutdown();
    log::info!("Server stopped");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_workflow(
    State(registry): State<WorkflowRegistry>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            log::warn!("Rejected workflow request: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    match registry.start_json(payload).await {
        Ok(workflow_id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "workflow_id": workflow_id })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn workflow_status(
    State(registry): State<WorkflowRegistry>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, RegistryError> {
    let record = registry.status(&id).await?;
    Ok(Json(record.into()))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RegistryError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        if status != StatusCode::NOT_FOUND {
            log::warn!("Rejected workflow request: {}", self);
        }
        error_response(status, self.to_string())
    }
}
