//! Caller identity derived from a bearer credential.
//!
//! Identities are never persisted. They are rebuilt from the verified token
//! on every request and passed explicitly to every downstream call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable tenant key. Chats are owned by email.
    pub email: String,
    pub display_name: String,
    /// Realm roles in token order.
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Whether the caller holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Realm-level access block as issued by OIDC providers such as Keycloak.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims read from a verified token.
///
/// Only `exp` is required by the decoder; a missing `email` is rejected by
/// the resolver rather than the deserializer so that the failure is logged
/// with a useful reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

impl TokenClaims {
    /// Roles from `realm_access.roles`, empty when the block is absent.
    pub fn roles(&self) -> Vec<String> {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.clone())
            .unwrap_or_default()
    }

    /// `name`, falling back to `preferred_username`, then the empty string.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.preferred_username.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_without_realm_access_have_no_roles() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"exp": 1, "email": "alice@example.com"}"#).unwrap();
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn test_claims_with_empty_realm_access_have_no_roles() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"exp": 1, "realm_access": {}}"#).unwrap();
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn test_claims_roles_keep_token_order() {
        let claims: TokenClaims = serde_json::from_str(
            r#"{"exp": 1, "realm_access": {"roles": ["user", "admin", "offline_access"]}}"#,
        )
        .unwrap();
        assert_eq!(claims.roles(), vec!["user", "admin", "offline_access"]);
    }

    #[test]
    fn test_display_name_falls_back_to_preferred_username() {
        let claims = TokenClaims {
            preferred_username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.display_name(), "alice");

        let claims = TokenClaims {
            name: Some("Alice Liddell".to_string()),
            preferred_username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.display_name(), "Alice Liddell");
    }

    #[test]
    fn test_has_role() {
        let identity = Identity {
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
            roles: vec!["user".to_string()],
            expires_at: Utc::now(),
        };
        assert!(identity.has_role("user"));
        assert!(!identity.has_role("admin"));
    }
}
