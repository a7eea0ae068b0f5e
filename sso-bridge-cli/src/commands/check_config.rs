use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

use sso_bridge::prelude::*;

pub fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    println!("{} {}", "Service:".bold(), config.service.name);
    println!("{} {}", "Port:".bold(), config.service.port);
    println!("{} {}", "Front end:".bold(), config.sso.frontend_url);
    println!("{} {}", "State backend:".bold(), config.sso.state.backend);

    let enabled = config.enabled_providers();
    if enabled.is_empty() {
        println!("{}", "No SSO providers configured".yellow());
    }

    let mut problems = Vec::new();
    for kind in ProviderKind::ALL {
        let settings = match kind {
            ProviderKind::Github => config.sso.github.as_ref(),
            ProviderKind::Google => config.sso.google.as_ref(),
            ProviderKind::Oidc => config.sso.oidc.as_ref(),
        };
        let Some(settings) = settings else {
            println!("  {} {}", "-".dimmed(), kind.display_name().dimmed());
            continue;
        };

        match check_provider(kind, settings) {
            Ok(()) => println!("  {} {}", "✓".green(), kind.display_name()),
            Err(reason) => {
                println!("  {} {}: {}", "✗".red(), kind.display_name(), reason);
                problems.push(format!("{}: {}", kind.name(), reason));
            }
        }
    }

    let admins = config
        .sso
        .users
        .iter()
        .filter(|u| u.is_admin || u.is_super_admin)
        .count();
    println!("{} {} ({} admin)", "Seeded users:".bold(), config.sso.users.len(), admins);

    PasetoSessionIssuer::from_config(&config.session).context("Invalid session configuration")?;

    if !problems.is_empty() {
        bail!("{} provider(s) misconfigured: {}", problems.len(), problems.join("; "));
    }

    println!("{}", "Configuration OK".green().bold());
    Ok(())
}

fn check_provider(kind: ProviderKind, settings: &ProviderSettings) -> std::result::Result<(), String> {
    if settings.client_id.is_empty() {
        return Err("client_id is empty".to_string());
    }
    if settings.redirect_url.is_empty() {
        return Err("redirect_url is empty".to_string());
    }
    if kind == ProviderKind::Oidc && settings.issuer_url.as_deref().unwrap_or("").is_empty() {
        return Err("issuer_url is required".to_string());
    }
    Ok(())
}
