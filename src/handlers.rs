use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{ApiError, ValidatedJson};
use crate::schema::{AskRequest, AskResponse, VerifyRequest, VerifyResponse};
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "API is up and running." }))
}

/// Liveness plus whether an MCP session can currently be opened.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let tool_server_healthy = match state.tool_server.connect().await {
        Ok(session) => {
            if let Err(e) = session.close().await {
                warn!("Failed to close health check session: {}", e);
            }
            true
        }
        Err(e) => {
            warn!("Tool server unreachable: {}", e);
            false
        }
    };
    Json(json!({
        "status": "ok",
        "tool_server": tool_server_healthy
    }))
}

/// Guard the query, then hand in-scope queries to the model agent.
pub async fn ask(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    info!(data_set = %request.data_set, "Received ask request");

    let verdict = state.guard.classify(&request.user_input).await.map_err(|e| {
        error!("Guard agent failed: {}", e);
        ApiError::Internal
    })?;

    if !verdict.is_proceed() {
        info!(guard_type = %verdict.kind, "Guard answered directly");
        return Ok(Json(AskResponse::from_guard(verdict.message)));
    }

    let run = state
        .model_agent
        .run(&request.user_input, request.data_set)
        .await
        .map_err(|e| {
            error!("Model agent failed: {}", e);
            ApiError::Internal
        })?;

    let finding = state.tool_extraction.extract(&run.transcript).map_err(|e| {
        error!("Failed to extract tool info: {}", e);
        ApiError::ResultParsing
    })?;

    info!(tool_used = ?finding.tool_used, "Model agent answered");
    Ok(Json(AskResponse::from_model(run.output, finding)))
}

/// Run only the guard and report whether the query would be processed.
pub async fn verify(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let verdict = state.guard.classify(&request.user_input).await.map_err(|e| {
        error!("Verification failed: {}", e);
        ApiError::Upstream(e.to_string())
    })?;

    info!(guard_type = %verdict.kind, "Verified request");
    Ok(Json(VerifyResponse {
        is_valid: verdict.is_proceed(),
        message: verdict.message,
    }))
}
