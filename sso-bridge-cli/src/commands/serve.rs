use anyhow::{Context, Result};
use std::path::Path;

use sso_bridge::prelude::*;

pub async fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    init_tracing(&config)?;

    let service = SsoService::from_config(&config)
        .await
        .context("Failed to build SSO service")?;

    for name in service.registry().names() {
        let configured = match service.registry().get(name) {
            Ok(provider) => provider.is_configured().await,
            Err(_) => false,
        };
        tracing::info!(provider = name, configured, "provider status");
    }

    Server::new(config)
        .serve(service.router())
        .await
        .context("Server terminated with an error")
}
