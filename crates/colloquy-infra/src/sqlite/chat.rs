//! SQLite conversation store implementation.
//!
//! Implements `ConversationStore` from `colloquy-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and every write inside a transaction on the single writer connection.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use colloquy_core::chat::repository::{ConversationStore, ConversationTx};
use colloquy_types::chat::{Chat, Message, NewMessage, SenderType};
use colloquy_types::error::RepositoryError;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::pool::DatabasePool;

const CHAT_COLUMNS: &str = "id, title, owner_email, last_active_date, created_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, chat_id, content, sender_type, idempotency_key, created_at, updated_at";

/// SQLite-backed implementation of `ConversationStore`.
#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: DatabasePool,
}

impl SqliteConversationStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// An open write transaction on the writer connection.
///
/// Dropping it without `commit` rolls back.
pub struct SqliteConversationTx {
    tx: Transaction<'static, Sqlite>,
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    title: String,
    owner_email: String,
    last_active_date: String,
    created_at: String,
    updated_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            owner_email: row.try_get("owner_email")?,
            last_active_date: row.try_get("last_active_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            id: parse_uuid(&self.id, "chat id")?,
            title: self.title,
            owner_email: self.owner_email,
            last_active_date: parse_datetime(&self.last_active_date)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    chat_id: String,
    content: String,
    sender_type: String,
    idempotency_key: Option<String>,
    created_at: String,
    updated_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            content: row.try_get("content")?,
            sender_type: row.try_get("sender_type")?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let sender: SenderType = self
            .sender_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Message {
            id: parse_uuid(&self.id, "message id")?,
            chat_id: parse_uuid(&self.chat_id, "chat_id")?,
            content: self.content,
            sender,
            idempotency_key: self.idempotency_key,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamp, so text order in SQLite is time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn rows_to_chats(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Chat>, RepositoryError> {
    rows.iter()
        .map(|row| ChatRow::from_row(row).map_err(query_error)?.into_chat())
        .collect()
}

fn rows_to_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    rows.iter()
        .map(|row| MessageRow::from_row(row).map_err(query_error)?.into_message())
        .collect()
}

// ---------------------------------------------------------------------------
// ConversationStore implementation
// ---------------------------------------------------------------------------

impl ConversationStore for SqliteConversationStore {
    type Tx = SqliteConversationTx;

    async fn begin(&self) -> Result<SqliteConversationTx, RepositoryError> {
        let tx = self.pool.writer.begin().await.map_err(query_error)?;
        Ok(SqliteConversationTx { tx })
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?"))
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(r) => Ok(Some(ChatRow::from_row(&r).map_err(query_error)?.into_chat()?)),
            None => Ok(None),
        }
    }

    async fn list_chats_by_owner(&self, owner_email: &str) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE owner_email = ?
             ORDER BY last_active_date DESC, rowid DESC"
        ))
        .bind(owner_email)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_to_chats(&rows)
    }

    async fn list_messages_by_chat(&self, chat_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(chat_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_to_messages(&rows)
    }
}

// ---------------------------------------------------------------------------
// ConversationTx implementation
// ---------------------------------------------------------------------------

impl ConversationTx for SqliteConversationTx {
    async fn create_chat(
        &mut self,
        owner_email: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Chat, RepositoryError> {
        let now = now.trunc_subsecs(6);
        let chat = Chat {
            id: Uuid::now_v7(),
            title: title.to_string(),
            owner_email: owner_email.to_string(),
            last_active_date: now,
            created_at: now,
            updated_at: now,
        };
        let stamp = format_datetime(&now);

        sqlx::query(
            "INSERT INTO chats (id, title, owner_email, last_active_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chat.id.to_string())
        .bind(&chat.title)
        .bind(&chat.owner_email)
        .bind(&stamp)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(chat)
    }

    async fn create_message(&mut self, message: NewMessage<'_>) -> Result<Message, RepositoryError> {
        let now = message.now.trunc_subsecs(6);
        let stored = Message {
            id: Uuid::now_v7(),
            chat_id: message.chat_id,
            content: message.content.to_string(),
            sender: message.sender,
            idempotency_key: message.idempotency_key.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let stamp = format_datetime(&now);

        sqlx::query(
            "INSERT INTO messages (id, chat_id, content, sender_type, idempotency_key, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stored.id.to_string())
        .bind(stored.chat_id.to_string())
        .bind(&stored.content)
        .bind(stored.sender.to_string())
        .bind(stored.idempotency_key.as_deref())
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "idempotency key already used by {} in chat {}",
                        stored.sender, stored.chat_id
                    ));
                }
            }
            query_error(e)
        })?;

        Ok(stored)
    }

    async fn update_last_active(
        &mut self,
        chat_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let stamp = format_datetime(&now.trunc_subsecs(6));
        let result = sqlx::query(
            "UPDATE chats SET last_active_date = MAX(last_active_date, ?), updated_at = ?
             WHERE id = ?",
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(chat_id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_chat(&mut self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?"))
            .bind(chat_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error)?;

        match row {
            Some(r) => Ok(Some(ChatRow::from_row(&r).map_err(query_error)?.into_chat()?)),
            None => Ok(None),
        }
    }

    async fn find_message_by_key(
        &mut self,
        chat_id: &Uuid,
        sender: SenderType,
        key: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE chat_id = ? AND sender_type = ? AND idempotency_key = ?"
        ))
        .bind(chat_id.to_string())
        .bind(sender.to_string())
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_error)?;

        match row {
            Some(r) => Ok(Some(MessageRow::from_row(&r).map_err(query_error)?.into_message()?)),
            None => Ok(None),
        }
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(query_error)
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await.map_err(query_error)
    }
}
