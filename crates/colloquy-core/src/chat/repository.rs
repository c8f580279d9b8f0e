//! ConversationStore and ConversationTx trait definitions.
//!
//! Reads that need no isolation go through the store directly; every write
//! goes through a transaction opened with `begin()`. Follows the same RPITIT
//! pattern as the other repository traits.

use chrono::{DateTime, Utc};
use colloquy_types::chat::{Chat, Message, NewMessage, SenderType};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Ownership-scoped persistence for chats and messages.
///
/// Implementations live in colloquy-infra (e.g., `SqliteConversationStore`)
/// and in `chat::memory` for tests. No operation is retried by the store.
pub trait ConversationStore: Send + Sync {
    /// Transaction handle returned by [`begin`](Self::begin).
    type Tx: ConversationTx;

    /// Open a transaction. Writes made through it become visible only on commit.
    fn begin(&self) -> impl std::future::Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Get a chat by its unique ID.
    fn get_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// List chats owned by `owner_email`, most recently active first.
    fn list_chats_by_owner(
        &self,
        owner_email: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    /// List messages in a chat in creation order.
    fn list_messages_by_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;
}

/// A unit of work over the conversation tables.
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// every write made through it. This is what makes request cancellation safe:
/// an aborted future drops its transaction.
pub trait ConversationTx: Send {
    /// Insert a chat with `last_active_date = created_at = now`.
    fn create_chat(
        &mut self,
        owner_email: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Insert a message. Fails with `Conflict` when the idempotency key is
    /// already used by the same sender in the same chat.
    fn create_message(
        &mut self,
        message: NewMessage<'_>,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Set `last_active_date = max(last_active_date, now)`.
    fn update_last_active(
        &mut self,
        chat_id: &Uuid,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a chat, seeing this transaction's own writes.
    fn get_chat(
        &mut self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Find the message a sender stored under an idempotency key.
    fn find_message_by_key(
        &mut self,
        chat_id: &Uuid,
        sender: SenderType,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Make every write durable.
    fn commit(self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard every write.
    fn rollback(self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
