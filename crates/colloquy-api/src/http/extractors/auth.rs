//! Bearer token authentication extractor.
//!
//! Reads `Authorization: Bearer <token>`, resolves it to an [`Identity`]
//! with the configured resolver and applies the role guard. Handlers receive
//! the caller's identity as an explicit value.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use colloquy_core::auth::guard::authorize;
use colloquy_core::auth::resolver::bearer_token;
use colloquy_types::error::AuthError;
use colloquy_types::identity::Identity;

use crate::http::error::AppError;
use crate::state::AppState;

/// The authenticated caller. Extracting this validates the bearer token.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Identity);

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader))
            .transpose()?;

        let token = bearer_token(header)?;
        let identity = state.identity_resolver.resolve(token)?;
        authorize(&identity, &state.required_roles[..])?;

        tracing::debug!(caller = %identity.email, "request authenticated");
        Ok(CallerIdentity(identity))
    }
}
