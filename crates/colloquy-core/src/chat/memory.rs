//! In-memory `ConversationStore` for tests and local experiments.
//!
//! Transactions stage their writes privately and publish them under one lock
//! on commit, so an uncommitted transaction is never observable. Failures can
//! be injected per sender to exercise rollback paths.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use colloquy_types::chat::{Chat, Message, NewMessage, SenderType};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

use super::repository::{ConversationStore, ConversationTx};

#[derive(Debug, Default)]
struct MemoryState {
    chats: Vec<Chat>,
    messages: Vec<Message>,
}

/// Process-local store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    state: Arc<Mutex<MemoryState>>,
    failing_senders: Arc<Mutex<HashSet<SenderType>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_message` for `sender` fail.
    pub fn fail_messages_from(&self, sender: SenderType) {
        if let Ok(mut failing) = self.failing_senders.lock() {
            failing.insert(sender);
        }
    }

    /// Undo [`fail_messages_from`](Self::fail_messages_from).
    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing_senders.lock() {
            failing.clear();
        }
    }

    /// Total committed messages across all chats.
    pub fn message_count(&self) -> usize {
        self.state.lock().map(|s| s.messages.len()).unwrap_or(0)
    }

    /// Total committed chats across all owners.
    pub fn chat_count(&self) -> usize {
        self.state.lock().map(|s| s.chats.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state.lock().map_err(|_| RepositoryError::Connection)
    }

    fn chat_snapshot(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.lock()?.chats.iter().find(|c| c.id == *chat_id).cloned())
    }

    fn owner_snapshot(&self, owner_email: &str) -> Result<Vec<Chat>, RepositoryError> {
        let state = self.lock()?;
        let mut owned: Vec<(usize, Chat)> = state
            .chats
            .iter()
            .enumerate()
            .filter(|(_, c)| c.owner_email == owner_email)
            .map(|(i, c)| (i, c.clone()))
            .collect();
        owned.sort_by(|(ia, a), (ib, b)| {
            b.last_active_date
                .cmp(&a.last_active_date)
                .then(ib.cmp(ia))
        });
        Ok(owned.into_iter().map(|(_, c)| c).collect())
    }

    fn messages_snapshot(&self, chat_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let state = self.lock()?;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == *chat_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

impl ConversationStore for InMemoryConversationStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, RepositoryError> {
        Ok(InMemoryTx {
            store: self.clone(),
            chats: Vec::new(),
            messages: Vec::new(),
            touches: Vec::new(),
        })
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        self.chat_snapshot(chat_id)
    }

    async fn list_chats_by_owner(&self, owner_email: &str) -> Result<Vec<Chat>, RepositoryError> {
        self.owner_snapshot(owner_email)
    }

    async fn list_messages_by_chat(&self, chat_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        self.messages_snapshot(chat_id)
    }
}

/// Staged writes of one in-memory transaction.
#[derive(Debug)]
pub struct InMemoryTx {
    store: InMemoryConversationStore,
    chats: Vec<Chat>,
    messages: Vec<Message>,
    touches: Vec<(Uuid, DateTime<Utc>)>,
}

impl InMemoryTx {
    fn visible_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let mut chat = match self.chats.iter().find(|c| c.id == *chat_id) {
            Some(pending) => Some(pending.clone()),
            None => self.store.chat_snapshot(chat_id)?,
        };
        if let Some(chat) = chat.as_mut() {
            for (id, at) in &self.touches {
                if id == chat_id {
                    touch(chat, *at);
                }
            }
        }
        Ok(chat)
    }

    fn visible_message_by_key(
        &self,
        chat_id: &Uuid,
        sender: SenderType,
        key: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let matches = |m: &&Message| {
            m.chat_id == *chat_id && m.sender == sender && m.idempotency_key.as_deref() == Some(key)
        };
        if let Some(m) = self.messages.iter().find(matches) {
            return Ok(Some(m.clone()));
        }
        let state = self.store.lock()?;
        Ok(state.messages.iter().find(matches).cloned())
    }

    fn sender_fails(&self, sender: SenderType) -> bool {
        self.store
            .failing_senders
            .lock()
            .map(|failing| failing.contains(&sender))
            .unwrap_or(false)
    }

    fn publish(self) -> Result<(), RepositoryError> {
        let mut state = self.store.lock()?;
        state.chats.extend(self.chats);
        state.messages.extend(self.messages);
        for (chat_id, at) in self.touches {
            if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
                touch(chat, at);
            }
        }
        Ok(())
    }
}

fn touch(chat: &mut Chat, at: DateTime<Utc>) {
    chat.last_active_date = chat.last_active_date.max(at);
    chat.updated_at = at;
}

impl ConversationTx for InMemoryTx {
    async fn create_chat(
        &mut self,
        owner_email: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Chat, RepositoryError> {
        let chat = Chat {
            id: Uuid::now_v7(),
            title: title.to_string(),
            owner_email: owner_email.to_string(),
            last_active_date: now,
            created_at: now,
            updated_at: now,
        };
        self.chats.push(chat.clone());
        Ok(chat)
    }

    async fn create_message(&mut self, message: NewMessage<'_>) -> Result<Message, RepositoryError> {
        if self.sender_fails(message.sender) {
            return Err(RepositoryError::Query(format!(
                "injected failure for {} message",
                message.sender
            )));
        }
        if message.content.is_empty() {
            return Err(RepositoryError::Query("CHECK constraint failed: content".to_string()));
        }
        if self.visible_chat(&message.chat_id)?.is_none() {
            return Err(RepositoryError::Query("FOREIGN KEY constraint failed".to_string()));
        }
        if let Some(key) = message.idempotency_key {
            if self
                .visible_message_by_key(&message.chat_id, message.sender, key)?
                .is_some()
            {
                return Err(RepositoryError::Conflict(format!(
                    "idempotency key '{key}' already used in chat {}",
                    message.chat_id
                )));
            }
        }

        let stored = Message {
            id: Uuid::now_v7(),
            chat_id: message.chat_id,
            content: message.content.to_string(),
            sender: message.sender,
            idempotency_key: message.idempotency_key.map(str::to_string),
            created_at: message.now,
            updated_at: message.now,
        };
        self.messages.push(stored.clone());
        Ok(stored)
    }

    async fn update_last_active(
        &mut self,
        chat_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.visible_chat(chat_id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.touches.push((*chat_id, now));
        Ok(())
    }

    async fn get_chat(&mut self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        self.visible_chat(chat_id)
    }

    async fn find_message_by_key(
        &mut self,
        chat_id: &Uuid,
        sender: SenderType,
        key: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.visible_message_by_key(chat_id, sender, key)
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.publish()
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
