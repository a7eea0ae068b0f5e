//! Google OAuth provider implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::error::{Error, Result};
use crate::sso::identity::{normalize, OAuthUser};
use crate::sso::provider::{require_state, ProviderConfig, ProviderKind, SsoProvider};
use crate::sso::state::StateTokenService;

use super::{build_http_client, fetch_user_info, ConfigSlot, OAuth2Defaults, OAuth2Setup};

const DEFAULTS: OAuth2Defaults = OAuth2Defaults {
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo",
    scopes: &["https://www.googleapis.com/auth/userinfo.email"],
};

/// Google OAuth provider
pub struct GoogleProvider {
    http_client: HttpClient,
    setup: ConfigSlot<OAuth2Setup>,
}

impl GoogleProvider {
    pub fn new(http_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(http_timeout)?,
            setup: ConfigSlot::new(),
        })
    }
}

#[async_trait]
impl SsoProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn init(&self, config: ProviderConfig) -> Result<()> {
        let result = OAuth2Setup::build(self.kind(), &config, &DEFAULTS);
        match result {
            Ok(setup) => {
                self.setup.replace(Some(setup)).await;
                tracing::info!(provider = "google", "OAuth provider initialized");
                Ok(())
            }
            Err(e) => {
                self.setup.replace(None).await;
                tracing::error!(provider = "google", error = %e, "failed to initialize OAuth provider");
                Err(e)
            }
        }
    }

    async fn is_configured(&self) -> bool {
        self.setup.is_set().await
    }

    async fn authorization_url(&self, state: &str) -> Result<String> {
        Ok(self.setup.current(self.kind()).await?.authorization_url(state))
    }

    async fn get_user_info(
        &self,
        states: &StateTokenService,
        state: &str,
        code: &str,
    ) -> Result<OAuthUser> {
        let setup = self.setup.current(self.kind()).await?;
        require_state(states, state).await?;

        let tokens = setup.exchange(self.kind(), &self.http_client, code).await?;
        if !self.verify_user(&tokens) {
            return Err(Error::ExchangeFailed(
                "code exchange yielded invalid token".to_string(),
            ));
        }

        let user_info = fetch_user_info(
            self.kind(),
            &self.http_client,
            setup.userinfo_url(),
            &tokens.access_token,
        )
        .await?;

        normalize(self.kind(), user_info)?.with_tokens(&tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sso::provider::OAuthTokens;

    #[tokio::test]
    async fn test_authorization_url_generation() {
        let provider = GoogleProvider::new(Duration::from_secs(5)).unwrap();
        provider
            .init(ProviderConfig::new(
                "https://example.com/callback/google",
                "test-client-id",
                "test-secret",
            ))
            .await
            .unwrap();

        let url = provider.authorization_url("test-state").await.unwrap();
        assert!(url.contains("accounts.google.com"));
        assert!(url.contains("client_id=test-client-id"));
        assert!(url.contains("state=test-state"));
        assert!(url.contains("redirect_uri="));
        assert!(url.contains("userinfo.email"));
    }

    #[tokio::test]
    async fn test_configured_scopes_replace_default() {
        let provider = GoogleProvider::new(Duration::from_secs(5)).unwrap();
        let config = ProviderConfig {
            scopes: vec!["openid".to_string(), "email".to_string()],
            ..ProviderConfig::new("https://example.com/cb", "id", "secret")
        };
        provider.init(config).await.unwrap();

        let url = provider.authorization_url("s").await.unwrap();
        assert!(url.contains("scope=openid+email"));
        assert!(!url.contains("userinfo.email"));
    }

    #[test]
    fn test_verify_user() {
        let provider = GoogleProvider::new(Duration::from_secs(5)).unwrap();
        let mut tokens = OAuthTokens {
            access_token: "ya29.token".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry: Some(chrono::Utc::now() + chrono::Duration::seconds(3599)),
            id_token: None,
        };
        assert!(provider.verify_user(&tokens));

        tokens.expiry = Some(chrono::Utc::now());
        assert!(!provider.verify_user(&tokens));
    }
}
