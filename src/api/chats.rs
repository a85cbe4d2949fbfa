use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use planner_core::models::{AppendMessageInput, ChatSession, Message, User};

use super::{ApiError, AppState, AuthUser};

pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ChatSession>>, ApiError> {
    Ok(Json(state.db.list_chats(user.id)?))
}

pub async fn create_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ChatSession>, ApiError> {
    Ok(Json(state.db.create_chat(user.id)?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let chat = load_owned_chat(&state, &user, &chat_id)?;
    Ok(Json(chat.messages))
}

pub async fn append_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
    Json(input): Json<AppendMessageInput>,
) -> Result<Json<Message>, ApiError> {
    if input.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }
    let chat = load_owned_chat(&state, &user, &chat_id)?;
    let message = state
        .db
        .append_message(chat.id, input.role, &input.content)?;
    Ok(Json(message))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chat = load_owned_chat(&state, &user, &chat_id)?;
    state.db.delete_chat(chat.id)?;
    Ok(Json(json!({ "success": true })))
}

/// Shared lookup for the `:chatId` routes. The failure order is part of the
/// contract: malformed id -> 400 before any store lookup, unknown id -> 404,
/// wrong owner -> 403.
fn load_owned_chat(state: &AppState, user: &User, chat_id: &str) -> Result<ChatSession, ApiError> {
    let id = Uuid::parse_str(chat_id).map_err(|_| {
        tracing::warn!(chat_id, "invalid chat id received");
        ApiError::BadRequest("Invalid chatId".to_string())
    })?;

    let chat = state
        .db
        .get_chat(id)?
        .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;

    if chat.user_id != user.id {
        return Err(ApiError::Forbidden);
    }

    Ok(chat)
}
