//! Conversation engine and port definitions for Colloquy.
//!
//! This crate defines the "ports" (store, responder and identity traits) that
//! the infrastructure layer implements. It depends only on `colloquy-types`
//! -- never on `colloquy-infra` or any database/IO crate.

pub mod auth;
pub mod chat;
pub mod context;
pub mod responder;
