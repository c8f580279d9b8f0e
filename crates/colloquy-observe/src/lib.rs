//! Observability setup for Colloquy: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
