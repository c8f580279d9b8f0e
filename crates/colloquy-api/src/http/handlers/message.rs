//! Message endpoints.
//!
//! POST /v1/chats/{chat_id}/messages appends a user message and the reply.
//! GET  /v1/chats/{chat_id}/messages lists a chat's messages oldest first.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use colloquy_core::chat::service::{parse_chat_id, validate_content};
use colloquy_types::chat::{Message, SenderType};
use colloquy_types::error::ServiceError;

use crate::http::error::AppError;
use crate::http::extractors::auth::CallerIdentity;
use crate::http::handlers::chat::ContentRequest;
use crate::state::AppState;

/// Optional client-generated key that makes an append safe to retry.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Wire shape of a stored message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub content: String,
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
    pub chat_id: Uuid,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            content: m.content,
            sender_type: m.sender,
            created_at: m.created_at,
            chat_id: m.chat_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageResponse {
    pub user_message: MessageResponse,
    pub ai_response: MessageResponse,
}

/// POST /v1/chats/{chat_id}/messages
pub async fn append_message(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Json<AppendMessageResponse>, AppError> {
    let Json(body) = body?;
    validate_content(&body.content)?;
    let chat_id = parse_chat_id(&chat_id)?;
    let idempotency_key = idempotency_key(&headers)?;

    let ctx = state.request_context();
    let exchange = state
        .conversation_service
        .append_message(&ctx, &identity, &chat_id, &body.content, idempotency_key)
        .await?;

    Ok(Json(AppendMessageResponse {
        user_message: exchange.user_message.into(),
        ai_response: exchange.ai_message.into(),
    }))
}

/// GET /v1/chats/{chat_id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let chat_id = parse_chat_id(&chat_id)?;

    let ctx = state.request_context();
    let messages = state
        .conversation_service
        .list_messages(&ctx, &identity, &chat_id)
        .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<&str>, ServiceError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value.to_str().map_err(|_| {
                ServiceError::validation("Invalid request parameters")
                    .with_detail("Idempotency-Key", "Idempotency key must be visible ASCII")
            })
        })
        .transpose()
}
