//! `colloquy check-config`: validate configuration without serving.

use anyhow::{Context, Result};
use console::style;

use colloquy_infra::auth::jwt::JwtIdentityResolver;
use colloquy_infra::config::database_url;
use colloquy_types::config::ServiceConfig;

/// Parse the signing key and print the effective configuration.
///
/// The key itself is never printed.
pub fn check_config(config: &ServiceConfig, json: bool) -> Result<()> {
    JwtIdentityResolver::from_config(&config.auth)
        .context("failed to load the token verification key")?;

    let key_source = match (&config.auth.public_key, &config.auth.public_key_file) {
        (Some(_), _) => "inline".to_string(),
        (None, Some(path)) => path.clone(),
        (None, None) => "none".to_string(),
    };

    if json {
        let summary = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "listen": format!("{}:{}", config.server.host, config.server.port),
            "request_timeout_ms": config.server.request_timeout_ms,
            "database_url": database_url(config),
            "auth": {
                "algorithm": config.auth.algorithm,
                "key_source": key_source,
                "leeway_secs": config.auth.leeway_secs,
                "issuer": config.auth.issuer,
                "audience": config.auth.audience,
                "required_roles": config.auth.required_roles,
            },
            "responder_timeout_ms": config.responder.timeout_ms,
            "cors_allowed_origins": config.cors.allowed_origins,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let none = || style("none".to_string()).dim().to_string();

    println!();
    println!(
        "  {} Colloquy v{} configuration is valid",
        style("✓").green().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Server ──").dim());
    println!("  Listen:          {}:{}", config.server.host, config.server.port);
    println!("  Request timeout: {} ms", config.server.request_timeout_ms);
    println!("  Database:        {}", style(database_url(config)).dim());
    println!();

    println!("  {}", style("── Auth ──").dim());
    println!("  Algorithm:       {}", style(&config.auth.algorithm).bold());
    println!("  Key:             {key_source}");
    println!("  Leeway:          {} s", config.auth.leeway_secs);
    println!(
        "  Issuer:          {}",
        config.auth.issuer.clone().unwrap_or_else(none)
    );
    println!(
        "  Audience:        {}",
        join_or(&config.auth.audience, none)
    );
    println!(
        "  Required roles:  {}",
        join_or(&config.auth.required_roles, none)
    );
    println!();

    println!("  {}", style("── Responder ──").dim());
    println!("  Timeout:         {} ms", config.responder.timeout_ms);
    println!(
        "  CORS origins:    {}",
        join_or(&config.cors.allowed_origins, none)
    );
    println!();

    Ok(())
}

fn join_or(items: &[String], empty: impl Fn() -> String) -> String {
    if items.is_empty() {
        empty()
    } else {
        items.join(", ")
    }
}
