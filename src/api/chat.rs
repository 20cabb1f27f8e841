use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::chat::{ChatRequest, ChatResponse};
use crate::error::AppError;

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Some(service) = state.chat.clone() else {
        return Err(AppError::Unavailable(
            "Chat is not configured: set OPENAI_API_KEY".to_string(),
        ));
    };
    let Json(request) = payload?;

    let response = service.chat(request.messages).await?;
    Ok(Json(response))
}
