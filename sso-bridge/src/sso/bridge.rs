//! Session bridge
//!
//! Turns a normalized identity into a host session: provision the account on
//! first login, enforce the admin-only SSO policy, mint a session token with a
//! per-transaction one-time password and build the front-end redirect.
//! Provisioning and issuance are the last steps of a callback, so any earlier
//! failure leaves no account and no token behind.

use std::sync::Arc;

use async_trait::async_trait;
use oauth2::url::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::identity::OAuthUser;
use super::provider::ProviderKind;

/// Local account as seen by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUser {
    pub username: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub is_super_admin: bool,
}

impl HostUser {
    /// Only admin-class accounts may complete SSO login
    pub fn may_use_sso(&self) -> bool {
        self.is_admin || self.is_super_admin
    }
}

/// Host user store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up an account; `Ok(None)` when it does not exist
    async fn get_user(&self, username: &str) -> Result<Option<HostUser>>;

    /// Create an account; `is_sso` marks it as having no local password
    async fn create_user(&self, username: &str, is_sso: bool) -> Result<()>;
}

/// Host credential issuer
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    /// Mint a session token for `username`, bound to `one_time_password`
    async fn issue_session(&self, username: &str, one_time_password: &str) -> Result<String>;
}

/// Result of a completed login
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub provider: ProviderKind,
    pub username: String,
    pub token: String,
}

/// Generate a random one-time password for one login transaction
pub fn generate_one_time_password() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;

    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Provisioning, authorization gate and session issuance
#[derive(Clone)]
pub struct SessionBridge {
    users: Arc<dyn UserStore>,
    issuer: Arc<dyn SessionIssuer>,
    login_url: Url,
}

impl SessionBridge {
    /// Create a bridge redirecting to `{frontend_url}/login`
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: Arc<dyn SessionIssuer>,
        frontend_url: &str,
    ) -> Result<Self> {
        let login_url = Url::parse(&format!("{}/login", frontend_url.trim_end_matches('/')))
            .map_err(|e| Error::Internal(format!("invalid front-end URL {}: {}", frontend_url, e)))?;

        Ok(Self {
            users,
            issuer,
            login_url,
        })
    }

    /// Fetch the account, creating it as an SSO account on first login
    pub async fn provision(&self, username: &str) -> Result<HostUser> {
        let existing = self
            .users
            .get_user(username)
            .await
            .map_err(|e| Error::UserLookupFailed(e.to_string()))?;

        if let Some(user) = existing {
            return Ok(user);
        }

        tracing::info!(username = %username, "creating SSO user on first login");
        self.users
            .create_user(username, true)
            .await
            .map_err(|e| Error::UserCreationFailed(e.to_string()))?;

        self.users
            .get_user(username)
            .await
            .map_err(|e| Error::UserLookupFailed(e.to_string()))?
            .ok_or_else(|| Error::UserLookupFailed(format!("{} missing after creation", username)))
    }

    /// Provision, authorize and mint a session for a verified identity
    pub async fn complete_login(&self, provider: ProviderKind, user: &OAuthUser) -> Result<SessionGrant> {
        let username = user.primary_identifier.as_str();
        let host_user = self.provision(username).await?;

        if !host_user.may_use_sso() {
            return Err(Error::UserNotAllowed(host_user.username));
        }

        let one_time_password = generate_one_time_password();
        let token = self
            .issuer
            .issue_session(&host_user.username, &one_time_password)
            .await
            .map_err(|e| match e {
                Error::SessionIssuanceFailed(_) => e,
                other => Error::SessionIssuanceFailed(other.to_string()),
            })?;

        Ok(SessionGrant {
            provider,
            username: host_user.username,
            token,
        })
    }

    /// Front-end URL carrying the provider, session token and username
    pub fn redirect_url(&self, grant: &SessionGrant) -> String {
        let mut url = self.login_url.clone();
        url.query_pairs_mut()
            .append_pair("provider", grant.provider.display_name())
            .append_pair("token", &grant.token)
            .append_pair("username", &grant.username);
        url.into()
    }
}
