//! Provider adapter trait and shared types
//!
//! Every provider exposes the same five operations: `init`, `handle_login`,
//! `handle_callback`, `get_user_info` and `verify_user`. The login and
//! callback halves of the flow are identical across providers and live here
//! as default methods; adapters supply configuration, the authorization URL
//! and identity retrieval.

use async_trait::async_trait;
use axum::response::Redirect;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::bridge::SessionBridge;
use super::identity::OAuthUser;
use super::state::{generate_state, StateTokenService};

/// Tokens are treated as expired this long before their stated expiry
const EXPIRY_DELTA_SECS: i64 = 10;

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Github,
    Google,
    Oidc,
}

impl ProviderKind {
    /// All providers, in registry order
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Github, ProviderKind::Google, ProviderKind::Oidc];

    /// Route name (`/login/{name}`)
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github",
            ProviderKind::Google => "google",
            ProviderKind::Oidc => "oidc",
        }
    }

    /// Name carried in the final redirect to the front end
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Github => "GitHub",
            ProviderKind::Google => "Google",
            ProviderKind::Oidc => "OIDC",
        }
    }

    /// Payload field holding the primary identifier
    pub fn identity_field(&self) -> &'static str {
        match self {
            ProviderKind::Github => "login",
            ProviderKind::Google | ProviderKind::Oidc => "email",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable per-adapter configuration
///
/// Handed to [`SsoProvider::init`]; re-initialization replaces it as a whole.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub redirect_url: String,
    pub client_id: String,
    pub client_secret: String,

    /// OIDC issuer; required by the OIDC adapter, ignored elsewhere
    pub issuer_url: Option<String>,

    /// Overrides the provider's default scopes when non-empty
    pub scopes: Vec<String>,

    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        redirect_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            redirect_url: redirect_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_issuer(mut self, issuer_url: impl Into<String>) -> Self {
        self.issuer_url = Some(issuer_url.into());
        self
    }

    /// Point the adapter at non-default endpoints
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.auth_url = Some(auth_url.into());
        self.token_url = Some(token_url.into());
        self.userinfo_url = Some(userinfo_url.into());
        self
    }

    /// Scopes to request, falling back to the provider defaults
    pub(crate) fn scopes_or(&self, defaults: &[&str]) -> Vec<String> {
        if self.scopes.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes.clone()
        }
    }
}

/// OAuth tokens received from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token from the provider
    pub access_token: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Refresh token (if provided)
    pub refresh_token: Option<String>,

    /// Absolute expiry derived from `expires_in` (if provided)
    pub expiry: Option<DateTime<Utc>>,

    /// ID token for OIDC providers
    pub id_token: Option<String>,
}

impl OAuthTokens {
    /// Structural validity: a non-empty access token that is not about to expire
    ///
    /// Local check only; revocation at the provider is not consulted.
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - chrono::Duration::seconds(EXPIRY_DELTA_SECS) > Utc::now(),
            None => true,
        }
    }

    pub(crate) fn expiry_from(expires_in: Option<std::time::Duration>) -> Option<DateTime<Utc>> {
        expires_in
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d)
    }
}

/// Query parameters of a provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub code: String,

    /// Set by the provider when the user declined or the request was invalid
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub error_description: Option<String>,
}

/// Shared collaborators for one login transaction
#[derive(Clone)]
pub struct SsoContext {
    pub states: StateTokenService,
    pub bridge: SessionBridge,
}

impl SsoContext {
    pub fn new(states: StateTokenService, bridge: SessionBridge) -> Self {
        Self { states, bridge }
    }
}

/// Reject the callback unless its state token was issued and is unconsumed
pub(crate) async fn require_state(states: &StateTokenService, state: &str) -> Result<()> {
    if states.validate(state).await {
        Ok(())
    } else {
        Err(Error::InvalidState)
    }
}

/// OAuth/OIDC provider adapter
#[async_trait]
pub trait SsoProvider: Send + Sync {
    /// Which provider this adapter speaks to
    fn kind(&self) -> ProviderKind;

    /// Resolve endpoint metadata and store the configuration
    ///
    /// On failure the adapter is left unconfigured; previously stored
    /// configuration is discarded.
    async fn init(&self, config: ProviderConfig) -> Result<()>;

    /// Whether `init` has completed successfully
    async fn is_configured(&self) -> bool;

    /// Provider authorization URL embedding `state`
    async fn authorization_url(&self, state: &str) -> Result<String>;

    /// Validate state, exchange the code and retrieve the normalized identity
    async fn get_user_info(
        &self,
        states: &StateTokenService,
        state: &str,
        code: &str,
    ) -> Result<OAuthUser>;

    /// Local structural validity check of a previously obtained token
    fn verify_user(&self, token: &OAuthTokens) -> bool {
        token.is_valid()
    }

    /// Start a login: issue a state token and redirect to the provider
    async fn handle_login(&self, ctx: &SsoContext) -> Result<Redirect> {
        if !self.is_configured().await {
            return Err(Error::NotConfigured(self.kind().name().to_string()));
        }

        // Registered only once the provider URL exists
        let state = generate_state();
        let url = self.authorization_url(&state).await?;
        ctx.states.register(&state).await?;

        tracing::debug!(provider = %self.kind(), "redirecting to provider authorization endpoint");
        Ok(Redirect::temporary(&url))
    }

    /// Finish a login: retrieve the identity and hand it to the session bridge
    async fn handle_callback(&self, ctx: &SsoContext, params: CallbackParams) -> Result<Redirect> {
        let kind = self.kind();

        if let Some(error) = params.error {
            tracing::warn!(
                provider = %kind,
                error = %error,
                description = params.error_description.as_deref().unwrap_or(""),
                "provider returned an authorization error"
            );
            return Err(Error::ExchangeFailed(format!("provider returned error: {}", error)));
        }

        let user = self
            .get_user_info(&ctx.states, &params.state, &params.code)
            .await
            .inspect_err(|e| {
                tracing::warn!(provider = %kind, error = %e, "error when getting user info");
            })?;

        let grant = ctx.bridge.complete_login(kind, &user).await?;
        let url = ctx.bridge.redirect_url(&grant);

        tracing::info!(provider = %kind, username = %grant.username, "SSO login completed");
        Ok(Redirect::temporary(&url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sso::state::{InMemoryStateStore, StateStore};
    use crate::tokens::PasetoSessionIssuer;
    use crate::users::InMemoryUserStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn tokens(access_token: &str, expiry: Option<DateTime<Utc>>) -> OAuthTokens {
        OAuthTokens {
            access_token: access_token.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry,
            id_token: None,
        }
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(ProviderKind::from_name("github"), Some(ProviderKind::Github));
        assert_eq!(ProviderKind::from_name("oidc"), Some(ProviderKind::Oidc));
        assert_eq!(ProviderKind::from_name("GitHub"), None);
        assert_eq!(ProviderKind::from_name("azure"), None);
        assert_eq!(ProviderKind::Github.display_name(), "GitHub");
        assert_eq!(ProviderKind::Google.identity_field(), "email");
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        assert!(tokens("gho_123", None).is_valid());
        assert!(!tokens("", None).is_valid());
    }

    #[test]
    fn test_token_expiry_delta() {
        let soon = Utc::now() + chrono::Duration::seconds(5);
        let later = Utc::now() + chrono::Duration::seconds(3600);
        let past = Utc::now() - chrono::Duration::seconds(1);

        assert!(!tokens("t", Some(soon)).is_valid());
        assert!(tokens("t", Some(later)).is_valid());
        assert!(!tokens("t", Some(past)).is_valid());
    }

    /// Adapter that reports configured but cannot build a URL
    struct BrokenUrlProvider;

    #[async_trait]
    impl SsoProvider for BrokenUrlProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Github
        }

        async fn init(&self, _config: ProviderConfig) -> Result<()> {
            Ok(())
        }

        async fn is_configured(&self) -> bool {
            true
        }

        async fn authorization_url(&self, _state: &str) -> Result<String> {
            Err(Error::NotConfigured("configuration replaced".to_string()))
        }

        async fn get_user_info(
            &self,
            _states: &StateTokenService,
            _state: &str,
            _code: &str,
        ) -> Result<OAuthUser> {
            Err(Error::InvalidState)
        }
    }

    struct CountingStore {
        inner: InMemoryStateStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl StateStore for CountingStore {
        fn ttl(&self) -> Duration {
            self.inner.ttl()
        }

        async fn set_state(&self, token: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_state(token).await
        }

        async fn is_state_valid(&self, token: &str) -> Result<Option<String>> {
            self.inner.is_state_valid(token).await
        }
    }

    #[tokio::test]
    async fn test_failed_login_registers_no_state() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStateStore::new(Duration::from_secs(60)),
            writes: AtomicUsize::new(0),
        });
        let bridge = SessionBridge::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(PasetoSessionIssuer::ephemeral(Duration::from_secs(60))),
            "http://localhost",
        )
        .unwrap();
        let ctx = SsoContext::new(
            StateTokenService::new(store.clone(), Duration::from_secs(60)),
            bridge,
        );

        let err = BrokenUrlProvider.handle_login(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scopes_default() {
        let config = ProviderConfig::new("https://a/cb", "id", "secret");
        assert_eq!(config.scopes_or(&["read:user"]), vec!["read:user"]);

        let config = ProviderConfig {
            scopes: vec!["user:email".to_string()],
            ..config
        };
        assert_eq!(config.scopes_or(&["read:user"]), vec!["user:email"]);
    }
}
