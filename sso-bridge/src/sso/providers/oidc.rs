//! Generic OpenID Connect provider
//!
//! `init` performs discovery against the issuer with a bounded timeout and
//! keeps the discovered metadata (including the JWKS). The `CoreClient` is
//! rebuilt from that metadata per call since its type-state generics make
//! storing it impractical.
//!
//! Identity comes from the verified ID token only; the user-info endpoint is
//! never consulted.

use std::time::Duration;

use async_trait::async_trait;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointNotSet,
    EndpointSet, IssuerUrl, Nonce, OAuth2TokenResponse, RedirectUrl, Scope,
};
use reqwest::Client as HttpClient;

use crate::error::{Error, Result};
use crate::sso::identity::{normalize, OAuthUser};
use crate::sso::provider::{
    require_state, OAuthTokens, ProviderConfig, ProviderKind, SsoProvider,
};
use crate::sso::state::StateTokenService;

use super::{build_http_client, ConfigSlot};

const DEFAULT_SCOPES: &[&str] = &["profile", "email"];

type DiscoveredClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// Discovery result plus client credentials
struct OidcSetup {
    metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
}

impl OidcSetup {
    fn client(&self) -> DiscoveredClient {
        CoreClient::from_provider_metadata(
            self.metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone())
    }
}

/// OpenID Connect provider
pub struct OidcProvider {
    http_client: HttpClient,
    timeout: Duration,
    setup: ConfigSlot<OidcSetup>,
}

impl OidcProvider {
    /// Create an unconfigured adapter
    ///
    /// `timeout` bounds discovery, code exchange and verification.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            timeout,
            setup: ConfigSlot::new(),
        })
    }

    async fn discover(&self, config: &ProviderConfig) -> Result<OidcSetup> {
        let issuer = config
            .issuer_url
            .as_deref()
            .filter(|issuer| !issuer.is_empty())
            .ok_or_else(|| Error::NotConfigured("OIDC issuer URL is not set".to_string()))?;

        let issuer_url = IssuerUrl::new(issuer.to_string())
            .map_err(|e| Error::NotConfigured(format!("invalid OIDC issuer URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| Error::NotConfigured(format!("Invalid redirect URI: {}", e)))?;

        let metadata = tokio::time::timeout(
            self.timeout,
            CoreProviderMetadata::discover_async(issuer_url, &self.http_client),
        )
        .await
        .map_err(|_| {
            Error::NotConfigured(format!(
                "OIDC discovery timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::NotConfigured(format!("OIDC discovery failed: {}", e)))?;

        Ok(OidcSetup {
            metadata,
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            redirect_url,
            scopes: config.scopes_or(DEFAULT_SCOPES),
        })
    }

    /// Exchange the code and verify the returned ID token
    async fn exchange_and_verify(&self, setup: &OidcSetup, code: &str) -> Result<OAuthUser> {
        let client = setup.client();

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| Error::NotConfigured(format!("token endpoint not configured: {}", e)))?
            .request_async(&self.http_client)
            .await
            .map_err(|e| Error::ExchangeFailed(format!("OIDC token exchange failed: {}", e)))?;

        let id_token = token_response.extra_fields().id_token().ok_or_else(|| {
            Error::IdentityVerificationFailed("no id_token in token response".to_string())
        })?;

        let tokens = OAuthTokens {
            access_token: token_response.access_token().secret().clone(),
            token_type: token_response.token_type().as_ref().to_string(),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            expiry: OAuthTokens::expiry_from(token_response.expires_in()),
            id_token: serde_json::to_value(id_token)
                .ok()
                .and_then(|v| v.as_str().map(String::from)),
        };
        if !self.verify_user(&tokens) {
            return Err(Error::ExchangeFailed(
                "code exchange yielded invalid token".to_string(),
            ));
        }

        // Signature, issuer, audience and expiry; the nonce is not bound to
        // the login transaction.
        let verifier = client.id_token_verifier();
        let claims = id_token
            .claims(&verifier, |_: Option<&Nonce>| Ok(()))
            .map_err(|e| {
                Error::IdentityVerificationFailed(format!("failed to verify raw id token: {}", e))
            })?;

        let raw = serde_json::to_value(claims).map_err(|e| {
            Error::IdentityVerificationFailed(format!("error when claiming OIDC user: {}", e))
        })?;

        normalize(self.kind(), raw)?.with_tokens(&tokens)
    }
}

#[async_trait]
impl SsoProvider for OidcProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Oidc
    }

    async fn init(&self, config: ProviderConfig) -> Result<()> {
        match self.discover(&config).await {
            Ok(setup) => {
                let issuer = setup.metadata.issuer().as_str().to_string();
                self.setup.replace(Some(setup)).await;
                tracing::info!(provider = "oidc", issuer = %issuer, "OIDC provider discovered");
                Ok(())
            }
            Err(e) => {
                self.setup.replace(None).await;
                tracing::error!(provider = "oidc", error = %e, "error when initializing OIDC provider");
                Err(e)
            }
        }
    }

    async fn is_configured(&self) -> bool {
        self.setup.is_set().await
    }

    async fn authorization_url(&self, state: &str) -> Result<String> {
        let setup = self.setup.current(self.kind()).await?;
        let client = setup.client();

        let state = state.to_string();
        let mut auth_request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            Nonce::new_random,
        );
        for scope in &setup.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (url, _, _) = auth_request.url();
        Ok(url.to_string())
    }

    async fn get_user_info(
        &self,
        states: &StateTokenService,
        state: &str,
        code: &str,
    ) -> Result<OAuthUser> {
        let setup = self.setup.current(self.kind()).await?;
        require_state(states, state).await?;

        tokio::time::timeout(self.timeout, self.exchange_and_verify(&setup, code))
            .await
            .map_err(|_| {
                Error::ExchangeFailed(format!(
                    "OIDC exchange timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }
}
