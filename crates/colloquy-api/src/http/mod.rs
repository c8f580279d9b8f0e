//! HTTP/REST API layer for Colloquy.
//!
//! Axum-based REST API at `/v1/` with bearer token authentication,
//! bare JSON bodies, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
