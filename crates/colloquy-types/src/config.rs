//! Service configuration types for Colloquy.
//!
//! `ServiceConfig` mirrors `config.toml`. Every field has a default so an
//! empty file (or no file) yields a runnable development configuration,
//! except that a signing key must be supplied before the server will start.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub responder: ResponderConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, store and responder included.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL. `None` selects the data-directory default.
    pub url: Option<String>,
}

/// Bearer token verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Inline public key: PEM, or a bare base64 SPKI body.
    pub public_key: Option<String>,
    /// Path to a PEM file; used when `public_key` is unset.
    pub public_key_file: Option<String>,
    /// Expected JWS algorithm. Must be asymmetric.
    pub algorithm: String,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
    pub issuer: Option<String>,
    /// When empty the `aud` claim is not checked.
    pub audience: Vec<String>,
    /// Roles of which the caller needs at least one. Empty admits everyone.
    pub required_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            public_key_file: None,
            algorithm: "RS256".to_string(),
            leeway_secs: 30,
            issuer: None,
            audience: Vec::new(),
            required_roles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub timeout_ms: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_default_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.algorithm, "RS256");
        assert_eq!(config.auth.leeway_secs, 30);
        assert!(config.auth.required_roles.is_empty());
        assert_eq!(config.responder.timeout_ms, 10_000);
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
    }

    #[test]
    fn test_service_config_deserialize_empty() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_service_config_deserialize_partial_sections() {
        let toml_str = r#"
[server]
port = 8080

[auth]
algorithm = "ES256"
required_roles = ["chat-user"]
audience = ["account"]

[cors]
allowed_origins = ["https://app.example.com"]
"#;
        let config: ServiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.algorithm, "ES256");
        assert_eq!(config.auth.leeway_secs, 30);
        assert_eq!(config.auth.required_roles, vec!["chat-user"]);
        assert_eq!(config.auth.audience, vec!["account"]);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert!(config.database.url.is_none());
    }
}
