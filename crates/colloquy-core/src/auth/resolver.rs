//! IdentityResolver trait and bearer header parsing.

use colloquy_types::error::AuthError;
use colloquy_types::identity::Identity;

/// Verifies a bearer credential and produces the caller's identity.
///
/// Implementations must be deterministic: the same valid token always
/// yields the same `Identity`. Every verification failure is reported as
/// [`AuthError::InvalidCredential`].
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Extract the token from an `Authorization` header value.
///
/// `None` (header absent) is `MissingCredential`; anything other than
/// `Bearer <token>` with a non-empty token is `MalformedHeader`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredential)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}
