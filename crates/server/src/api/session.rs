//! Session API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadence_core::{
    BatchIndex, FinalizeError, FinalizeOutcome, OrchestratorError, Payload, StartOptions,
    StatusSnapshot,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a consultation
#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    /// Generated when absent
    pub session_id: Option<String>,
    pub participant: String,
    #[serde(default)]
    pub recovering: bool,
}

/// Request body for finalizing the session
#[derive(Debug, Deserialize)]
pub struct FinalizeBody {
    /// Exclusive upper bound of expected batch indices
    pub last_index: BatchIndex,
    #[serde(default)]
    pub payload: Payload,
}

/// Request body for aborting the session
#[derive(Debug, Deserialize)]
pub struct AbortBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub accepted: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Orchestrator error carried to an HTTP response.
pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

/// HTTP status for an orchestrator error.
pub fn status_for(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::NoActiveSession
        | OrchestratorError::SessionClosed { .. }
        | OrchestratorError::FinalizeInProgress
        | OrchestratorError::NotActive { .. } => StatusCode::CONFLICT,
        OrchestratorError::LastIndexTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestratorError::ActorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Finalize(inner) => match inner {
            FinalizeError::HandlerFailed { .. } => StatusCode::BAD_GATEWAY,
            FinalizeError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            FinalizeError::Aborted { .. } | FinalizeError::Superseded => StatusCode::GONE,
            FinalizeError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(status = status.as_u16(), "Session request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a new consultation, replacing any previous one
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartSessionBody>,
) -> Result<(StatusCode, Json<StatusSnapshot>), ApiError> {
    let session_id = body
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let snapshot = state
        .orchestrator()
        .start_consultation(
            session_id,
            body.participant,
            StartOptions {
                recovering: body.recovering,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Current session snapshot
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    Ok(Json(state.orchestrator().status().await?))
}

/// Queue one partial batch
pub async fn enqueue_partial(
    State(state): State<Arc<AppState>>,
    Path(index): Path<BatchIndex>,
    Json(payload): Json<Payload>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    let ack = state.orchestrator().enqueue_partial(index, payload).await?;
    let status = if ack.is_accepted() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(EnqueueResponse {
            accepted: ack.is_accepted(),
        }),
    ))
}

/// Finalize and wait for the terminal outcome
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FinalizeBody>,
) -> Result<Json<FinalizeOutcome>, ApiError> {
    let outcome = state
        .orchestrator()
        .finalize(body.last_index, body.payload)
        .await?;
    Ok(Json(outcome))
}

/// Abort the active session
pub async fn abort(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AbortBody>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let orchestrator = state.orchestrator();
    orchestrator.abort(body.reason).await?;
    Ok(Json(orchestrator.status().await?))
}
