//! Infrastructure layer for Colloquy.
//!
//! Contains implementations of the ports defined in `colloquy-core`:
//! SQLite conversation storage, JWT identity resolution, and configuration
//! file loading.

pub mod auth;
pub mod config;
pub mod sqlite;
