//! JWT identity resolver.
//!
//! Verifies asymmetrically signed tokens (RSA, RSA-PSS, ECDSA, EdDSA) with a
//! public key loaded once at startup. Symmetric algorithms are refused when
//! the resolver is built, so a token can never be accepted on a shared secret.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use colloquy_core::auth::resolver::IdentityResolver;
use colloquy_types::config::AuthConfig;
use colloquy_types::error::AuthError;
use colloquy_types::identity::{Identity, TokenClaims};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;
use tracing::debug;

/// Startup failures while building a [`JwtIdentityResolver`].
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no public key configured (set auth.public_key or auth.public_key_file)")]
    Missing,

    #[error("failed to read public key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported JWT algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("symmetric JWT algorithm '{0}' is not allowed; configure an asymmetric one")]
    Symmetric(String),

    #[error("invalid public key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
}

/// Verifies bearer JWTs against a configured public key.
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
    leeway_secs: i64,
}

impl std::fmt::Debug for JwtIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityResolver")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityResolver {
    /// Build a resolver from the `[auth]` configuration section.
    ///
    /// Reads `public_key_file` when `public_key` is unset. A bare base64 key
    /// body (no PEM armor) is accepted and treated as an SPKI public key.
    pub fn from_config(config: &AuthConfig) -> Result<Self, KeyError> {
        let pem = match (&config.public_key, &config.public_key_file) {
            (Some(inline), _) if !inline.trim().is_empty() => inline.clone(),
            (_, Some(path)) => std::fs::read_to_string(path).map_err(|source| KeyError::Read {
                path: path.clone(),
                source,
            })?,
            _ => return Err(KeyError::Missing),
        };
        Self::from_pem(&pem, config)
    }

    /// Build a resolver from key text, taking every other setting from `config`.
    pub fn from_pem(key_text: &str, config: &AuthConfig) -> Result<Self, KeyError> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|_| KeyError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        let pem = armor_public_key(key_text);
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(KeyError::Symmetric(config.algorithm.clone()));
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes()),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
        }
        .map_err(KeyError::InvalidKey)?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            key,
            validation,
            leeway_secs: i64::try_from(config.leeway_secs).unwrap_or(i64::MAX),
        })
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, credential: &str) -> Result<Identity, AuthError> {
        let claims = decode::<TokenClaims>(credential, &self.key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "bearer token rejected");
                AuthError::InvalidCredential
            })?
            .claims;

        let now = Utc::now().timestamp();
        if claims.exp.saturating_add(self.leeway_secs) <= now {
            debug!(exp = claims.exp, now, "bearer token expired");
            return Err(AuthError::InvalidCredential);
        }

        let email = match claims.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => {
                debug!("bearer token has no email claim");
                return Err(AuthError::InvalidCredential);
            }
        };
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidCredential)?;

        Ok(Identity {
            email,
            display_name: claims.display_name(),
            roles: claims.roles(),
            expires_at,
        })
    }
}

/// Wrap a bare base64 key body in `PUBLIC KEY` armor; PEM input passes through.
fn armor_public_key(key_text: &str) -> String {
    let trimmed = key_text.trim();
    if trimmed.contains("-----BEGIN") {
        return trimmed.to_string();
    }
    let body: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for chunk in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const PRIVATE_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/private.pem"
    ));
    const PUBLIC_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/public.pem"
    ));
    const PUBLIC_KEY_PKCS1: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/public_pkcs1.pem"
    ));
    const OTHER_PRIVATE_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/other_private.pem"
    ));
    const EC_PRIVATE_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/ec_private.pem"
    ));
    const EC_PUBLIC_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/jwt/ec_public.pem"
    ));

    fn auth_config() -> AuthConfig {
        AuthConfig {
            public_key: Some(PUBLIC_KEY.to_string()),
            ..AuthConfig::default()
        }
    }

    fn resolver() -> JwtIdentityResolver {
        JwtIdentityResolver::from_config(&auth_config()).unwrap()
    }

    fn sign_with(private_pem: &str, claims: &serde_json::Value) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
    }

    fn sign(claims: &serde_json::Value) -> String {
        sign_with(PRIVATE_KEY, claims)
    }

    fn in_one_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token_resolves_identity() {
        let exp = in_one_hour();
        let token = sign(&json!({
            "exp": exp,
            "email": "alice@example.com",
            "name": "Alice Example",
            "preferred_username": "alice",
            "realm_access": { "roles": ["user", "admin"] }
        }));

        let identity = resolver().resolve(&token).unwrap();
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.display_name, "Alice Example");
        assert_eq!(identity.roles, vec!["user", "admin"]);
        assert_eq!(identity.expires_at.timestamp(), exp);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let token = sign(&json!({ "exp": in_one_hour(), "email": "alice@example.com" }));
        let r = resolver();
        assert_eq!(r.resolve(&token).unwrap(), r.resolve(&token).unwrap());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let token = sign(&json!({
            "exp": in_one_hour(),
            "email": "bob@example.com",
            "preferred_username": "bob"
        }));
        assert_eq!(resolver().resolve(&token).unwrap().display_name, "bob");

        let token = sign(&json!({ "exp": in_one_hour(), "email": "bob@example.com" }));
        assert_eq!(resolver().resolve(&token).unwrap().display_name, "");
    }

    #[test]
    fn test_missing_realm_access_yields_no_roles() {
        let token = sign(&json!({ "exp": in_one_hour(), "email": "bob@example.com" }));
        assert!(resolver().resolve(&token).unwrap().roles.is_empty());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = sign(&json!({
            "exp": Utc::now().timestamp() - 3600,
            "email": "alice@example.com"
        }));
        assert_eq!(resolver().resolve(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_leeway_admits_recently_expired_token() {
        let token = sign(&json!({
            "exp": Utc::now().timestamp() - 10,
            "email": "alice@example.com"
        }));
        assert!(resolver().resolve(&token).is_ok());

        let strict = JwtIdentityResolver::from_config(&AuthConfig {
            leeway_secs: 0,
            ..auth_config()
        })
        .unwrap();
        assert_eq!(strict.resolve(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_wrong_signing_key_rejected() {
        let token = sign_with(
            OTHER_PRIVATE_KEY,
            &json!({ "exp": in_one_hour(), "email": "alice@example.com" }),
        );
        assert_eq!(resolver().resolve(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_symmetric_token_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "exp": in_one_hour(), "email": "alice@example.com" }),
            &EncodingKey::from_secret(PUBLIC_KEY.as_bytes()),
        )
        .unwrap();
        assert_eq!(resolver().resolve(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJleHAiOjQxMDI0NDQ4MDAsImVtYWlsIjoibWFsbG9yeUBleGFtcGxlLmNvbSJ9.";
        assert_eq!(resolver().resolve(token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert_eq!(resolver().resolve("not-a-jwt"), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_missing_or_empty_email_rejected() {
        let r = resolver();
        let token = sign(&json!({ "exp": in_one_hour(), "name": "No Mail" }));
        assert_eq!(r.resolve(&token), Err(AuthError::InvalidCredential));

        let token = sign(&json!({ "exp": in_one_hour(), "email": "  " }));
        assert_eq!(r.resolve(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_audience_and_issuer_checked_when_configured() {
        let r = JwtIdentityResolver::from_config(&AuthConfig {
            audience: vec!["colloquy".to_string()],
            issuer: Some("https://sso.example.com/realms/main".to_string()),
            ..auth_config()
        })
        .unwrap();

        let good = sign(&json!({
            "exp": in_one_hour(),
            "email": "alice@example.com",
            "aud": "colloquy",
            "iss": "https://sso.example.com/realms/main"
        }));
        assert!(r.resolve(&good).is_ok());

        let wrong_aud = sign(&json!({
            "exp": in_one_hour(),
            "email": "alice@example.com",
            "aud": "someone-else",
            "iss": "https://sso.example.com/realms/main"
        }));
        assert_eq!(r.resolve(&wrong_aud), Err(AuthError::InvalidCredential));

        let wrong_iss = sign(&json!({
            "exp": in_one_hour(),
            "email": "alice@example.com",
            "aud": "colloquy",
            "iss": "https://evil.example.com"
        }));
        assert_eq!(r.resolve(&wrong_iss), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_audience_ignored_when_unconfigured() {
        let token = sign(&json!({
            "exp": in_one_hour(),
            "email": "alice@example.com",
            "aud": "account"
        }));
        assert!(resolver().resolve(&token).is_ok());
    }

    #[test]
    fn test_bare_base64_key_accepted() {
        let body: String = PUBLIC_KEY
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let r = JwtIdentityResolver::from_config(&AuthConfig {
            public_key: Some(body),
            ..AuthConfig::default()
        })
        .unwrap();

        let token = sign(&json!({ "exp": in_one_hour(), "email": "alice@example.com" }));
        assert_eq!(r.resolve(&token).unwrap().email, "alice@example.com");
    }

    #[test]
    fn test_pkcs1_public_key_accepted() {
        let r = JwtIdentityResolver::from_config(&AuthConfig {
            public_key: Some(PUBLIC_KEY_PKCS1.to_string()),
            ..AuthConfig::default()
        })
        .unwrap();
        let token = sign(&json!({ "exp": in_one_hour(), "email": "alice@example.com" }));
        assert!(r.resolve(&token).is_ok());
    }

    #[test]
    fn test_key_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public.pem");
        std::fs::write(&path, PUBLIC_KEY).unwrap();

        let r = JwtIdentityResolver::from_config(&AuthConfig {
            public_key_file: Some(path.display().to_string()),
            ..AuthConfig::default()
        })
        .unwrap();
        let token = sign(&json!({ "exp": in_one_hour(), "email": "alice@example.com" }));
        assert!(r.resolve(&token).is_ok());
    }

    #[test]
    fn test_es256_tokens_verified() {
        let r = JwtIdentityResolver::from_config(&AuthConfig {
            public_key: Some(EC_PUBLIC_KEY.to_string()),
            algorithm: "ES256".to_string(),
            ..AuthConfig::default()
        })
        .unwrap();
        let key = EncodingKey::from_ec_pem(EC_PRIVATE_KEY.as_bytes()).unwrap();
        let token = encode(
            &Header::new(Algorithm::ES256),
            &json!({ "exp": in_one_hour(), "email": "carol@example.com" }),
            &key,
        )
        .unwrap();
        assert_eq!(r.resolve(&token).unwrap().email, "carol@example.com");

        // An RS256 token must not pass an ES256 resolver.
        let rsa_token = sign(&json!({ "exp": in_one_hour(), "email": "carol@example.com" }));
        assert_eq!(r.resolve(&rsa_token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_startup_failures() {
        let missing = JwtIdentityResolver::from_config(&AuthConfig::default()).unwrap_err();
        assert!(matches!(missing, KeyError::Missing));

        let malformed = JwtIdentityResolver::from_config(&AuthConfig {
            public_key: Some("definitely not a key".to_string()),
            ..AuthConfig::default()
        })
        .unwrap_err();
        assert!(matches!(malformed, KeyError::InvalidKey(_)));

        let symmetric = JwtIdentityResolver::from_config(&AuthConfig {
            algorithm: "HS256".to_string(),
            ..auth_config()
        })
        .unwrap_err();
        assert!(matches!(symmetric, KeyError::Symmetric(_)));

        let unknown = JwtIdentityResolver::from_config(&AuthConfig {
            algorithm: "XX999".to_string(),
            ..auth_config()
        })
        .unwrap_err();
        assert!(matches!(unknown, KeyError::UnsupportedAlgorithm(_)));

        let unreadable = JwtIdentityResolver::from_config(&AuthConfig {
            public_key_file: Some("/nonexistent/colloquy/key.pem".to_string()),
            ..AuthConfig::default()
        })
        .unwrap_err();
        assert!(matches!(unreadable, KeyError::Read { .. }));
    }

    #[test]
    fn test_armor_wraps_at_64_columns() {
        let body = "A".repeat(130);
        let pem = armor_public_key(&body);
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines[0], "-----BEGIN PUBLIC KEY-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 2);
        assert_eq!(lines[4], "-----END PUBLIC KEY-----");
    }
}
