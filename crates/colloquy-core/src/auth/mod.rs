//! Caller authentication and authorization.
//!
//! `IdentityResolver` turns a bearer credential into an [`Identity`]; the
//! role guard decides whether that identity may use a route. Concrete
//! resolvers live in colloquy-infra.
//!
//! [`Identity`]: colloquy_types::identity::Identity

pub mod guard;
pub mod resolver;
