// Handlers for the chat API endpoint

use axum::{extract::State, http::StatusCode, Json};

use crate::chat::ChatError;
use crate::models::{ApiError, ChatRequest, ChatResponse};
use crate::AppState;

/// POST /api/chat - Run one conversation turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    tracing::info!("/chat called: conversation_id={:?}", req.conversation_id);
    let Some(chat) = state.chat.as_ref() else {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "chat service is not initialized".to_string(),
        ));
    };

    let response = chat
        .chat(&req.user_text, req.conversation_id)
        .await
        .map_err(chat_error_to_api_error)?;
    tracing::debug!(
        "/chat result: conversation_id={} response_id={:?}",
        response.conversation_id,
        response.response_id
    );
    Ok(Json(response))
}

/// Convert ChatError to API error response
fn chat_error_to_api_error(err: ChatError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        ChatError::Model(_) => StatusCode::BAD_GATEWAY,
        ChatError::Store(_) | ChatError::Prompt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("/chat failed: {err}");
    api_error(status, err.to_string())
}

fn api_error(status: StatusCode, message: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { message }))
}
