//! Shared domain types for Colloquy.
//!
//! This crate contains the domain types used across the service:
//! caller Identity, Chat and Message, the canonical error taxonomy, and
//! the configuration model.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
