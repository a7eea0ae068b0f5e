//! Provider dispatch table
//!
//! Maps a provider name to its adapter. Built once at startup and read-only
//! afterwards; adapters carry their own configuration, so lookups need no
//! synchronization. Unknown names resolve to `NotConfigured`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SsoConfig;
use crate::error::{Error, Result};

use super::provider::{ProviderConfig, ProviderKind, SsoProvider};
use super::providers::{GitHubProvider, GoogleProvider, OidcProvider};

/// Read-only mapping from provider name to adapter
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn SsoProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter under its provider name, replacing any previous one
    pub fn register(mut self, provider: Arc<dyn SsoProvider>) -> Self {
        self.providers.insert(provider.kind().name(), provider);
        self
    }

    /// Look up the adapter for `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn SsoProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(format!("unknown provider: {}", name)))
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Register all built-in adapters and initialize the configured ones
    ///
    /// An adapter whose `init` fails stays registered but unconfigured, so its
    /// routes answer `NotConfigured` instead of disappearing.
    pub async fn from_config(sso: &SsoConfig) -> Result<Self> {
        let registry = Self::new()
            .register(Arc::new(GitHubProvider::new(sso.http_timeout())?))
            .register(Arc::new(GoogleProvider::new(sso.http_timeout())?))
            .register(Arc::new(OidcProvider::new(sso.oidc_discovery_timeout())?));

        for kind in ProviderKind::ALL {
            let settings = match kind {
                ProviderKind::Github => sso.github.as_ref(),
                ProviderKind::Google => sso.google.as_ref(),
                ProviderKind::Oidc => sso.oidc.as_ref(),
            };
            let Some(settings) = settings else {
                tracing::debug!(provider = %kind, "no settings, provider disabled");
                continue;
            };

            let provider = registry.get(kind.name())?;
            if let Err(e) = provider.init(ProviderConfig::from(settings)).await {
                tracing::warn!(provider = %kind, error = %e, "provider left unconfigured");
            }
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;

    #[tokio::test]
    async fn test_unknown_provider_not_configured() {
        let registry = ProviderRegistry::from_config(&SsoConfig::default()).await.unwrap();
        assert_eq!(registry.names(), vec!["github", "google", "oidc"]);

        let err = registry.get("azure").err().unwrap();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_configured_providers_initialized() {
        let sso = SsoConfig {
            github: Some(ProviderSettings {
                redirect_url: "https://api.example.com/callback/github".to_string(),
                client_id: "gh".to_string(),
                client_secret: "secret".to_string(),
                issuer_url: None,
                scopes: Vec::new(),
                auth_url: None,
                token_url: None,
                userinfo_url: None,
            }),
            ..SsoConfig::default()
        };
        let registry = ProviderRegistry::from_config(&sso).await.unwrap();

        assert!(registry.get("github").unwrap().is_configured().await);
        assert!(!registry.get("google").unwrap().is_configured().await);
        assert!(!registry.get("oidc").unwrap().is_configured().await);
    }
}
