//! GitHub OAuth provider implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::error::{Error, Result};
use crate::sso::identity::{normalize, OAuthUser};
use crate::sso::provider::{require_state, ProviderConfig, ProviderKind, SsoProvider};
use crate::sso::state::StateTokenService;

use super::{build_http_client, fetch_user_info, ConfigSlot, OAuth2Defaults, OAuth2Setup};

const DEFAULTS: OAuth2Defaults = OAuth2Defaults {
    auth_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    userinfo_url: "https://api.github.com/user",
    // The public profile, including `login`, needs no scope
    scopes: &[],
};

/// GitHub OAuth provider
pub struct GitHubProvider {
    http_client: HttpClient,
    setup: ConfigSlot<OAuth2Setup>,
}

impl GitHubProvider {
    /// Create an unconfigured adapter whose outbound calls time out after `http_timeout`
    pub fn new(http_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(http_timeout)?,
            setup: ConfigSlot::new(),
        })
    }
}

#[async_trait]
impl SsoProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    async fn init(&self, config: ProviderConfig) -> Result<()> {
        match OAuth2Setup::build(self.kind(), &config, &DEFAULTS) {
            Ok(setup) => {
                self.setup.replace(Some(setup)).await;
                tracing::info!(provider = "github", "OAuth provider initialized");
                Ok(())
            }
            Err(e) => {
                self.setup.replace(None).await;
                tracing::error!(provider = "github", error = %e, "failed to initialize OAuth provider");
                Err(e)
            }
        }
    }

    async fn is_configured(&self) -> bool {
        self.setup.is_set().await
    }

    async fn authorization_url(&self, state: &str) -> Result<String> {
        let setup = self.setup.current(self.kind()).await?;
        Ok(setup.authorization_url(state))
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

        let raw = fetch_user_info(
            self.kind(),
            &self.http_client,
            setup.userinfo_url(),
            &tokens.access_token,
        )
        .await?;

        normalize(self.kind(), raw)?.with_tokens(&tokens)
    }
}
