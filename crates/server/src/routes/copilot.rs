use axum::{extract::State, Json};
use shared::{CopilotRequest, CopilotResponse};

use crate::{
    error::{ApiJson, AppError},
    routes::auth::AuthUser,
    state::AppState,
};

/// POST /api/copilot/chat
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CopilotRequest>,
) -> Result<Json<CopilotResponse>, AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest("No messages to reply to".to_string()));
    }
    tracing::debug!("Copilot request from {} ({} messages)", auth.user.email, req.messages.len());
    Ok(Json(state.copilot.reply(&req.messages).await))
}
