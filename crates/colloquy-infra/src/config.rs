//! Service configuration loader for Colloquy.
//!
//! Reads `config.toml` (by default from the data directory, `~/.colloquy/`)
//! and deserializes it into [`ServiceConfig`]. A missing file yields the
//! defaults; a file that exists but cannot be read or parsed is an error.

use std::path::{Path, PathBuf};

use colloquy_types::config::ServiceConfig;
use thiserror::Error;

use crate::sqlite::pool::default_database_url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default config location: `$COLLOQUY_DATA_DIR/config.toml`, falling back
/// to `~/.colloquy/config.toml`.
pub fn default_config_path() -> PathBuf {
    let data_dir = std::env::var("COLLOQUY_DATA_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.colloquy")
    });
    PathBuf::from(data_dir).join("config.toml")
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`ServiceConfig::default()`].
/// - If the file exists but fails to read or parse, returns an error.
/// - Otherwise returns the parsed config after [`validate`].
pub async fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(ServiceConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config = toml::from_str::<ServiceConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;

    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Reject settings the server cannot run with.
pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.server.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "server.request_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.responder.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "responder.timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.cors.allowed_origins.iter().any(|o| o.trim().is_empty()) {
        return Err(ConfigError::Invalid(
            "cors.allowed_origins must not contain empty entries".to_string(),
        ));
    }
    Ok(())
}

/// The configured database URL, or the data-directory default.
pub fn database_url(config: &ServiceConfig) -> String {
    config
        .database
        .url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(default_database_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).await.unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
url = "sqlite:///var/lib/colloquy/colloquy.db"

[auth]
public_key_file = "/etc/colloquy/realm.pem"
leeway_secs = 5
required_roles = ["chat-user"]

[responder]
timeout_ms = 2500
"#,
        )
        .await
        .unwrap();

        let config = load_config(&config_path).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout_ms, 30_000);
        assert_eq!(config.auth.public_key_file.as_deref(), Some("/etc/colloquy/realm.pem"));
        assert_eq!(config.auth.leeway_secs, 5);
        assert_eq!(config.auth.required_roles, vec!["chat-user"]);
        assert_eq!(config.responder.timeout_ms, 2500);
        assert_eq!(database_url(&config), "sqlite:///var/lib/colloquy/colloquy.db");
    }

    #[tokio::test]
    async fn load_config_invalid_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_config(&config_path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[tokio::test]
    async fn load_config_wrong_type_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "[server]\nport = \"eighty\"\n")
            .await
            .unwrap();

        assert!(matches!(
            load_config(&config_path).await,
            Err(ConfigError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn load_config_directory_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_config(tmp.path()).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn load_config_rejects_zero_timeouts() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "[responder]\ntimeout_ms = 0\n")
            .await
            .unwrap();

        let err = load_config(&config_path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn database_url_falls_back_to_default() {
        let config = ServiceConfig::default();
        assert!(database_url(&config).ends_with("colloquy.db"));
    }

    #[test]
    fn default_config_path_is_config_toml() {
        assert!(default_config_path().ends_with("config.toml"));
    }
}
