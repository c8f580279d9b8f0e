//! Chat and message types for Colloquy.
//!
//! A chat belongs to exactly one owner (keyed by email) and holds an ordered
//! list of messages. Both are created by the conversation service and never
//! deleted by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who produced a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender_type IN ('user', 'backend', 'llm'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// The authenticated end user.
    User,
    /// The service itself (system notices).
    Backend,
    /// The reply generator.
    Llm,
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderType::User => write!(f, "user"),
            SenderType::Backend => write!(f, "backend"),
            SenderType::Llm => write!(f, "llm"),
        }
    }
}

impl FromStr for SenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(SenderType::User),
            "backend" => Ok(SenderType::Backend),
            "llm" => Ok(SenderType::Llm),
            other => Err(format!("invalid sender type: '{other}'")),
        }
    }
}

/// A conversation owned by a single tenant.
///
/// `title` and `owner_email` are fixed at creation. `last_active_date`
/// only ever moves forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub title: String,
    pub owner_email: String,
    pub last_active_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a chat.
///
/// Messages are ordered by `created_at`, ties broken by insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub sender: SenderType,
    /// Client-supplied key used to deduplicate retried appends.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a message. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub chat_id: Uuid,
    pub content: &'a str,
    pub sender: SenderType,
    pub idempotency_key: Option<&'a str>,
    pub now: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_type_roundtrip() {
        for sender in [SenderType::User, SenderType::Backend, SenderType::Llm] {
            let parsed: SenderType = sender.to_string().parse().unwrap();
            assert_eq!(sender, parsed);
        }
    }

    #[test]
    fn test_sender_type_serde_is_lowercase() {
        let json = serde_json::to_string(&SenderType::Llm).unwrap();
        assert_eq!(json, "\"llm\"");
        let parsed: SenderType = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, SenderType::User);
    }

    #[test]
    fn test_sender_type_rejects_unknown() {
        let err = "assistant".parse::<SenderType>().unwrap_err();
        assert!(err.contains("assistant"));
    }
}
