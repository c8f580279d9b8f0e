//! Conversation service orchestrating identity, ownership and persistence.
//!
//! ConversationService coordinates the ConversationStore and the Responder
//! to implement the public conversation operations:
//!
//! - `start_conversation`: chat + USER message + LLM reply in one transaction.
//! - `append_message`: USER message committed first, LLM reply committed in a
//!   second transaction so no database transaction stays open while the
//!   responder runs.
//!
//! If the reply phase of an append fails, the USER message stays committed
//! and the caller gets a server error. Retrying without an idempotency key
//! stores the USER message again; retrying with the same key resumes at the
//! reply phase instead.

use std::time::Duration;

use chrono::Utc;
use colloquy_types::chat::{Chat, Message, NewMessage, SenderType};
use colloquy_types::error::{RepositoryError, ResponderError, ServiceError};
use colloquy_types::identity::Identity;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::repository::{ConversationStore, ConversationTx};
use crate::context::{Interrupted, RequestContext};
use crate::responder::Responder;

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Result of [`ConversationService::start_conversation`].
#[derive(Debug, Clone)]
pub struct StartedConversation {
    pub chat: Chat,
    pub user_message: Message,
    pub ai_message: Message,
}

/// Result of [`ConversationService::append_message`].
#[derive(Debug, Clone)]
pub struct AppendedExchange {
    pub user_message: Message,
    pub ai_message: Message,
    /// True when both messages already existed under the idempotency key.
    pub replayed: bool,
}

impl From<Interrupted> for ServiceError {
    fn from(e: Interrupted) -> Self {
        let message = match e {
            Interrupted::Cancelled => "Request was cancelled",
            Interrupted::DeadlineExceeded => "Request timed out",
        };
        ServiceError::server(message).with_internal(e.to_string())
    }
}

/// Orchestrates conversation writes.
///
/// Generic over `ConversationStore` and `Responder`; the concrete types are
/// pinned in the API crate.
pub struct ConversationService<S: ConversationStore, R: Responder> {
    store: S,
    responder: R,
    responder_timeout: Duration,
}

impl<S: ConversationStore, R: Responder> ConversationService<S, R> {
    pub fn new(store: S, responder: R, responder_timeout: Duration) -> Self {
        Self {
            store,
            responder,
            responder_timeout,
        }
    }

    // --- Start ---

    /// Create a chat titled `content`, its USER message and the LLM reply.
    ///
    /// All three writes commit together or not at all.
    pub async fn start_conversation(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
        content: &str,
    ) -> Result<StartedConversation, ServiceError> {
        validate_content(content)?;

        let started = ctx.run(self.start_in_tx(identity, content)).await??;

        info!(
            request_id = %ctx.request_id,
            chat_id = %started.chat.id,
            owner = %identity.email,
            "Conversation started"
        );
        Ok(started)
    }

    async fn start_in_tx(
        &self,
        identity: &Identity,
        content: &str,
    ) -> Result<StartedConversation, ServiceError> {
        let mut tx = self.store.begin().await?;
        match self.seed_chat(&mut tx, identity, content).await {
            Ok(started) => {
                tx.commit().await?;
                Ok(started)
            }
            Err(e) => {
                discard(tx).await;
                Err(e)
            }
        }
    }

    async fn seed_chat(
        &self,
        tx: &mut S::Tx,
        identity: &Identity,
        content: &str,
    ) -> Result<StartedConversation, ServiceError> {
        let now = Utc::now();
        let chat = tx.create_chat(&identity.email, content, now).await?;
        let user_message = tx
            .create_message(NewMessage {
                chat_id: chat.id,
                content,
                sender: SenderType::User,
                idempotency_key: None,
                now,
            })
            .await?;

        let reply = self.generate_reply(content).await?;

        let replied_at = Utc::now();
        let ai_message = tx
            .create_message(NewMessage {
                chat_id: chat.id,
                content: &reply,
                sender: SenderType::Llm,
                idempotency_key: None,
                now: replied_at,
            })
            .await?;
        tx.update_last_active(&chat.id, replied_at).await?;

        let chat = tx.get_chat(&chat.id).await?.ok_or_else(|| {
            ServiceError::server("").with_internal("chat missing inside its own transaction")
        })?;

        Ok(StartedConversation {
            chat,
            user_message,
            ai_message,
        })
    }

    // --- Append ---

    /// Append a USER message to an owned chat and store the LLM reply.
    ///
    /// With `idempotency_key`, a retry resumes where the previous attempt
    /// stopped: an already stored USER message is reused, and an already
    /// stored reply is returned without any write. Reusing a key with
    /// different content is a validation error.
    pub async fn append_message(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
        chat_id: &Uuid,
        content: &str,
        idempotency_key: Option<&str>,
    ) -> Result<AppendedExchange, ServiceError> {
        validate_content(content)?;
        if let Some(key) = idempotency_key {
            validate_idempotency_key(key)?;
        }
        self.owned_chat(ctx, identity, chat_id).await?;

        // Phase 1: USER message.
        let recorded = ctx
            .run(self.record_user_message(chat_id, content, idempotency_key))
            .await??;

        if let Some(ai_message) = recorded.existing_reply {
            debug!(
                request_id = %ctx.request_id,
                chat_id = %chat_id,
                "Replaying stored exchange for idempotency key"
            );
            return Ok(AppendedExchange {
                user_message: recorded.user_message,
                ai_message,
                replayed: true,
            });
        }

        // Phase 2: LLM reply.
        let user_message = recorded.user_message;
        let ai_message = match ctx
            .run(self.record_reply(chat_id, &user_message.content, idempotency_key))
            .await
            .map_err(ServiceError::from)
            .and_then(|r| r)
        {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    chat_id = %chat_id,
                    user_message_id = %user_message.id,
                    error = %e,
                    "Reply phase failed; user message remains committed"
                );
                return Err(e);
            }
        };

        info!(
            request_id = %ctx.request_id,
            chat_id = %chat_id,
            user_message_id = %user_message.id,
            ai_message_id = %ai_message.id,
            "Message appended"
        );
        Ok(AppendedExchange {
            user_message,
            ai_message,
            replayed: false,
        })
    }

    async fn record_user_message(
        &self,
        chat_id: &Uuid,
        content: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RecordedUserMessage, ServiceError> {
        let mut tx = self.store.begin().await?;

        if let Some(key) = idempotency_key {
            let prior = match tx.find_message_by_key(chat_id, SenderType::User, key).await {
                Ok(prior) => prior,
                Err(e) => {
                    discard(tx).await;
                    return Err(e.into());
                }
            };
            if let Some(user_message) = prior {
                if user_message.content != content {
                    discard(tx).await;
                    return Err(ServiceError::validation("Invalid request parameters").with_detail(
                        "Idempotency-Key",
                        "Idempotency key was already used with different content",
                    ));
                }
                let existing_reply = tx.find_message_by_key(chat_id, SenderType::Llm, key).await;
                discard(tx).await;
                return Ok(RecordedUserMessage {
                    user_message,
                    existing_reply: existing_reply?,
                });
            }
        }

        let now = Utc::now();
        let inserted = insert_and_touch(
            &mut tx,
            NewMessage {
                chat_id: *chat_id,
                content,
                sender: SenderType::User,
                idempotency_key,
                now,
            },
        )
        .await;
        match inserted {
            Ok(user_message) => {
                tx.commit().await?;
                Ok(RecordedUserMessage {
                    user_message,
                    existing_reply: None,
                })
            }
            Err(e) => {
                discard(tx).await;
                Err(conflict_as_validation(e, idempotency_key))
            }
        }
    }

    async fn record_reply(
        &self,
        chat_id: &Uuid,
        user_text: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Message, ServiceError> {
        // The responder runs before the transaction opens.
        let reply = self.generate_reply(user_text).await?;

        let mut tx = self.store.begin().await?;
        let inserted = insert_and_touch(
            &mut tx,
            NewMessage {
                chat_id: *chat_id,
                content: &reply,
                sender: SenderType::Llm,
                idempotency_key,
                now: Utc::now(),
            },
        )
        .await;
        match inserted {
            Ok(ai_message) => {
                tx.commit().await?;
                Ok(ai_message)
            }
            Err(e) => {
                discard(tx).await;
                Err(conflict_as_validation(e, idempotency_key))
            }
        }
    }

    // --- Reads ---

    /// Chats owned by the caller, most recently active first.
    pub async fn list_chats(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
    ) -> Result<Vec<Chat>, ServiceError> {
        let chats = ctx
            .run(self.store.list_chats_by_owner(&identity.email))
            .await??;
        Ok(chats)
    }

    /// Messages of an owned chat in creation order.
    pub async fn list_messages(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
        chat_id: &Uuid,
    ) -> Result<Vec<Message>, ServiceError> {
        self.owned_chat(ctx, identity, chat_id).await?;
        let messages = ctx.run(self.store.list_messages_by_chat(chat_id)).await??;
        Ok(messages)
    }

    // --- Helpers ---

    /// Load `chat_id` and check that the caller owns it.
    async fn owned_chat(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
        chat_id: &Uuid,
    ) -> Result<Chat, ServiceError> {
        let chat = ctx
            .run(self.store.get_chat(chat_id))
            .await??
            .ok_or_else(|| chat_not_found(&chat_id.to_string()))?;

        if chat.owner_email != identity.email {
            warn!(
                chat_id = %chat_id,
                caller = %identity.email,
                "Rejected access to another tenant's chat"
            );
            return Err(ServiceError::forbidden(
                "You do not have permission to access this chat",
            ));
        }
        Ok(chat)
    }

    /// Call the responder under the configured timeout.
    async fn generate_reply(&self, user_text: &str) -> Result<String, ResponderError> {
        let timeout_ms = self.responder_timeout.as_millis() as u64;
        let result = tokio::time::timeout(self.responder_timeout, self.responder.respond(user_text))
            .await
            .unwrap_or(Err(ResponderError::TimedOut(timeout_ms)));
        if let Err(e) = &result {
            warn!(error = %e, "Responder failed");
        }
        result
    }
}

struct RecordedUserMessage {
    user_message: Message,
    existing_reply: Option<Message>,
}

async fn insert_and_touch<T: ConversationTx>(
    tx: &mut T,
    message: NewMessage<'_>,
) -> Result<Message, RepositoryError> {
    let chat_id = message.chat_id;
    let now = message.now;
    let stored = tx.create_message(message).await?;
    tx.update_last_active(&chat_id, now).await?;
    Ok(stored)
}

/// Roll back, logging (not surfacing) a rollback failure.
async fn discard<T: ConversationTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed; transaction dropped");
    }
}

fn conflict_as_validation(e: RepositoryError, idempotency_key: Option<&str>) -> ServiceError {
    match (e, idempotency_key) {
        (RepositoryError::Conflict(_), Some(key)) => ServiceError::validation(
            "A message with this idempotency key is already being processed",
        )
        .with_detail("Idempotency-Key", key),
        (e, _) => e.into(),
    }
}

/// Reject empty or whitespace-only message content.
pub fn validate_content(content: &str) -> Result<(), ServiceError> {
    if content.trim().is_empty() {
        return Err(ServiceError::validation("Invalid request parameters")
            .with_detail("content", "Content cannot be empty"));
    }
    Ok(())
}

pub fn validate_idempotency_key(key: &str) -> Result<(), ServiceError> {
    if key.trim().is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ServiceError::validation("Invalid request parameters").with_detail(
            "Idempotency-Key",
            format!("Idempotency key must be 1 to {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        ));
    }
    Ok(())
}

/// Parse a chat id from a path segment. Unparseable ids cannot name an
/// existing chat, so they are reported as not found.
pub fn parse_chat_id(raw: &str) -> Result<Uuid, ServiceError> {
    raw.parse::<Uuid>().map_err(|_| chat_not_found(raw))
}

fn chat_not_found(chat_id: &str) -> ServiceError {
    ServiceError::not_found("The requested chat could not be found").with_detail("chatId", chat_id)
}
