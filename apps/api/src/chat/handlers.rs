use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::session::require_session;
use crate::chat;
use crate::errors::AppError;
use crate::llm_client::ChatTurn;
use crate::models::chat::{ChatMessageRow, ConversationRow};
use crate::profiles;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub conversation_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub conversation: ConversationRow,
    pub messages: Vec<ChatMessageRow>,
}

/// POST /api/v1/chat
pub async fn handle_send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let user = require_session(&headers, &state).await?;
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let conversation = match req.conversation_id {
        Some(id) => chat::get_conversation(&state.db, user.id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {id} not found")))?,
        None => chat::create_conversation(&state.db, user.id, &chat::derive_title(message)).await?,
    };

    chat::append_message(&state.db, conversation.id, "user", message).await?;

    let profile = profiles::get_profile(&state.db, user.id).await?;
    let system = chat::system_prompt(profile.as_ref());

    let mut turns: Vec<ChatTurn> = chat::recent_turns(&state.db, conversation.id).await?;
    if turns.is_empty() {
        // The just-appended message should always be present, but the
        // provider rejects an empty message list outright.
        turns.push(ChatTurn::user(message));
    }

    let reply = state
        .llm
        .chat(&turns, &system)
        .await
        .map_err(|e| AppError::Llm(format!("Chat completion failed: {e}")))?;

    chat::append_message(&state.db, conversation.id, "assistant", &reply).await?;

    Ok(Json(SendMessageResponse {
        conversation_id: conversation.id,
        reply,
    }))
}

/// GET /api/v1/chat
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationRow>>, AppError> {
    let user = require_session(&headers, &state).await?;
    let conversations = chat::list_conversations(&state.db, user.id).await?;
    Ok(Json(conversations))
}

/// GET /api/v1/chat/:conversation_id
pub async fn handle_get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let user = require_session(&headers, &state).await?;
    let conversation = chat::get_conversation(&state.db, user.id, conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;
    let messages = chat::conversation_history(&state.db, conversation.id).await?;
    Ok(Json(HistoryResponse {
        conversation,
        messages,
    }))
}
