//! CLI command definitions for the `colloquy` binary.
//!
//! Uses clap derive macros for argument parsing. Every config override can
//! also be given through a `COLLOQUY_*` environment variable.

pub mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use colloquy_infra::config::{default_config_path, load_config};
use colloquy_types::config::ServiceConfig;

/// Authenticated multi-tenant conversation service.
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve(ServeArgs),

    /// Load the configuration and signing key, then print a summary.
    CheckConfig(ConfigArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Where configuration comes from, plus overrides for the file's values.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to config.toml (default: $COLLOQUY_DATA_DIR/config.toml).
    #[arg(long, env = "COLLOQUY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL, e.g. sqlite:///var/lib/colloquy/colloquy.db.
    #[arg(long, env = "COLLOQUY_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Token verification key: PEM text or a bare base64 SPKI body.
    #[arg(long, env = "COLLOQUY_PUBLIC_KEY", hide_env_values = true)]
    pub public_key: Option<String>,

    /// Path to a PEM file holding the token verification key.
    #[arg(long, env = "COLLOQUY_PUBLIC_KEY_FILE")]
    pub public_key_file: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Host to bind to.
    #[arg(long, env = "COLLOQUY_HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "COLLOQUY_PORT")]
    pub port: Option<u16>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long)]
    pub otel: bool,
}

impl ConfigArgs {
    /// Load the config file and apply command-line/environment overrides.
    pub async fn load(&self) -> anyhow::Result<ServiceConfig> {
        let path = self.config.clone().unwrap_or_else(default_config_path);
        let mut config = load_config(&path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Overwrite file values with any flags that were given.
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
        if let Some(key) = &self.public_key {
            config.auth.public_key = Some(key.clone());
        }
        if let Some(path) = &self.public_key_file {
            // An explicit file wins over an inline key from the config file.
            config.auth.public_key_file = Some(path.clone());
            if self.public_key.is_none() {
                config.auth.public_key = None;
            }
        }
    }
}

impl ServeArgs {
    pub async fn load(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = self.config.load().await?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from([
            "colloquy",
            "-vv",
            "serve",
            "--port",
            "8080",
            "--database-url",
            "sqlite://db.sqlite",
            "--otel",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.otel);
                assert_eq!(args.config.database_url.as_deref(), Some("sqlite://db.sqlite"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = ServiceConfig::default();
        config.auth.public_key = Some("inline".to_string());
        config.database.url = Some("sqlite://from-file.db".to_string());

        let args = ConfigArgs {
            database_url: Some("sqlite://from-flag.db".to_string()),
            public_key_file: Some("/etc/colloquy/key.pem".to_string()),
            ..ConfigArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.database.url.as_deref(), Some("sqlite://from-flag.db"));
        assert_eq!(config.auth.public_key_file.as_deref(), Some("/etc/colloquy/key.pem"));
        assert!(config.auth.public_key.is_none());
    }

    #[tokio::test]
    async fn test_serve_args_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let args = ServeArgs {
            config: ConfigArgs {
                config: Some(dir.path().join("absent.toml")),
                ..ConfigArgs::default()
            },
            host: Some("0.0.0.0".to_string()),
            port: None,
            otel: false,
        };
        let config = args.load().await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
    }
}
