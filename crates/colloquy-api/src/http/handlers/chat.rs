//! Chat endpoints.
//!
//! POST /v1/chats starts a conversation.
//! GET  /v1/chats lists the caller's chats, most recently active first.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use colloquy_types::chat::Chat;

use crate::http::error::AppError;
use crate::http::extractors::auth::CallerIdentity;
use crate::http::handlers::message::MessageResponse;
use crate::state::AppState;

/// Request body shared by both write endpoints.
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub last_active_date: DateTime<Utc>,
}

impl From<Chat> for ChatSummaryResponse {
    fn from(c: Chat) -> Self {
        Self {
            id: c.id,
            title: c.title,
            last_active_date: c.last_active_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatResponse {
    pub id: Uuid,
    pub title: String,
    pub last_active_date: DateTime<Utc>,
    pub initial_message: MessageResponse,
    pub ai_response: MessageResponse,
}

/// POST /v1/chats
pub async fn create_chat(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Json<CreateChatResponse>, AppError> {
    let Json(body) = body?;

    let ctx = state.request_context();
    let started = state
        .conversation_service
        .start_conversation(&ctx, &identity, &body.content)
        .await?;

    Ok(Json(CreateChatResponse {
        id: started.chat.id,
        title: started.chat.title,
        last_active_date: started.chat.last_active_date,
        initial_message: started.user_message.into(),
        ai_response: started.ai_message.into(),
    }))
}

/// GET /v1/chats
pub async fn list_chats(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<Vec<ChatSummaryResponse>>, AppError> {
    let ctx = state.request_context();
    let chats = state.conversation_service.list_chats(&ctx, &identity).await?;

    Ok(Json(chats.into_iter().map(ChatSummaryResponse::from).collect()))
}
