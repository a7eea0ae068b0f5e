//! Provider adapter implementations
//!
//! GitHub and Google are plain OAuth2 authorization-code providers sharing
//! the client plumbing below; OIDC performs discovery and ID token
//! verification on top of it.

pub mod github;
pub mod google;
pub mod oidc;

pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use oidc::OidcProvider;

use std::sync::Arc;
use std::time::Duration;

use oauth2::{
    basic::BasicErrorResponse, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret,
    CsrfToken, EmptyExtraTokenFields, RedirectUrl, Scope, StandardRevocableToken,
    StandardTokenIntrospectionResponse, StandardTokenResponse, TokenResponse, TokenUrl,
};
use reqwest::Client as HttpClient;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::provider::{OAuthTokens, ProviderConfig, ProviderKind};

/// Type alias for our configured OAuth client
pub(crate) type ConfiguredClient = Client<
    BasicErrorResponse,
    StandardTokenResponse<EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    StandardTokenIntrospectionResponse<EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    StandardRevocableToken,
    BasicErrorResponse,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Build the outbound HTTP client shared by one adapter
///
/// Redirects are never followed on token or user-info calls.
pub(crate) fn build_http_client(timeout: Duration) -> Result<HttpClient> {
    HttpClient::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .user_agent(concat!("sso-bridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Atomically replaceable adapter configuration
///
/// Readers clone the `Arc` and never hold the lock across network calls.
pub(crate) struct ConfigSlot<T> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> ConfigSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) async fn replace(&self, value: Option<T>) {
        *self.inner.write().await = value.map(Arc::new);
    }

    pub(crate) async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub(crate) async fn current(&self, kind: ProviderKind) -> Result<Arc<T>> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::NotConfigured(kind.name().to_string()))
    }
}

/// Public endpoints and scopes of a plain OAuth2 provider
pub(crate) struct OAuth2Defaults {
    pub auth_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    pub scopes: &'static [&'static str],
}

/// Resolved configuration of a plain OAuth2 adapter
pub(crate) struct OAuth2Setup {
    client: ConfiguredClient,
    scopes: Vec<String>,
    userinfo_url: String,
}

impl OAuth2Setup {
    pub(crate) fn build(
        kind: ProviderKind,
        config: &ProviderConfig,
        defaults: &OAuth2Defaults,
    ) -> Result<Self> {
        let provider = kind.display_name();

        if config.client_id.is_empty() {
            return Err(Error::NotConfigured(format!("{} client id is empty", provider)));
        }

        let auth_url = config.auth_url.as_deref().unwrap_or(defaults.auth_url);
        let token_url = config.token_url.as_deref().unwrap_or(defaults.token_url);

        let client = Client::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).map_err(|e| {
                Error::NotConfigured(format!("Invalid {} auth URL: {}", provider, e))
            })?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).map_err(|e| {
                Error::NotConfigured(format!("Invalid {} token URL: {}", provider, e))
            })?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| Error::NotConfigured(format!("Invalid redirect URI: {}", e)))?,
            );

        Ok(Self {
            client,
            scopes: config.scopes_or(defaults.scopes),
            userinfo_url: config
                .userinfo_url
                .clone()
                .unwrap_or_else(|| defaults.userinfo_url.to_string()),
        })
    }

    pub(crate) fn authorization_url(&self, state: &str) -> String {
        let state = state.to_string();
        let mut auth_request = self.client.authorize_url(move || CsrfToken::new(state));

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (url, _) = auth_request.url();
        url.to_string()
    }

    pub(crate) async fn exchange(
        &self,
        kind: ProviderKind,
        http: &HttpClient,
        code: &str,
    ) -> Result<OAuthTokens> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(http)
            .await
            .map_err(|e| {
                Error::ExchangeFailed(format!("{} token exchange failed: {}", kind.display_name(), e))
            })?;

        Ok(OAuthTokens {
            access_token: token_result.access_token().secret().clone(),
            token_type: token_result.token_type().as_ref().to_string(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
            expiry: OAuthTokens::expiry_from(token_result.expires_in()),
            id_token: None,
        })
    }

    pub(crate) fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }
}

/// Authenticated GET against a provider user-info endpoint
pub(crate) async fn fetch_user_info(
    kind: ProviderKind,
    http: &HttpClient,
    url: &str,
    access_token: &str,
) -> Result<Value> {
    let provider = kind.display_name();

    let response = http
        .get(url)
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            Error::ExchangeFailed(format!("Failed to fetch {} user info: {}", provider, e))
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::ExchangeFailed(format!(
            "{} user info request failed: {} - {}",
            provider, status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::MalformedIdentity(format!("Failed to parse {} user info: {}", provider, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: OAuth2Defaults = OAuth2Defaults {
        auth_url: "https://idp.example.com/authorize",
        token_url: "https://idp.example.com/token",
        userinfo_url: "https://idp.example.com/userinfo",
        scopes: &["profile"],
    };

    #[test]
    fn test_setup_uses_overrides() {
        let config = ProviderConfig::new("https://app.example.com/cb", "client", "secret")
            .with_endpoints(
                "https://ghe.example.com/login/oauth/authorize",
                "https://ghe.example.com/login/oauth/access_token",
                "https://ghe.example.com/api/v3/user",
            );
        let setup = OAuth2Setup::build(ProviderKind::Github, &config, &DEFAULTS).unwrap();

        assert_eq!(setup.userinfo_url(), "https://ghe.example.com/api/v3/user");
        let url = setup.authorization_url("abc");
        assert!(url.starts_with("https://ghe.example.com/login/oauth/authorize"));
        assert!(url.contains("state=abc"));
    }

    #[test]
    fn test_setup_rejects_bad_redirect() {
        let config = ProviderConfig::new("not a url", "client", "secret");
        let err = OAuth2Setup::build(ProviderKind::Google, &config, &DEFAULTS)
            .err()
            .unwrap();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[test]
    fn test_setup_rejects_empty_client_id() {
        let config = ProviderConfig::new("https://app.example.com/cb", "", "secret");
        assert!(OAuth2Setup::build(ProviderKind::Github, &config, &DEFAULTS).is_err());
    }

    #[tokio::test]
    async fn test_config_slot_replace() {
        let slot: ConfigSlot<u32> = ConfigSlot::new();
        assert!(!slot.is_set().await);
        assert!(matches!(
            slot.current(ProviderKind::Oidc).await,
            Err(Error::NotConfigured(_))
        ));

        slot.replace(Some(7)).await;
        assert_eq!(*slot.current(ProviderKind::Oidc).await.unwrap(), 7);

        slot.replace(None).await;
        assert!(!slot.is_set().await);
    }
}
