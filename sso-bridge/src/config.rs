//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: SSO_BRIDGE_, nesting separator: `__`)
//! 2. The given config file, or ./config.toml
//! 3. Default values
//!
//! Provider credentials are read once at startup and handed to each adapter's
//! `init`; nothing in the SSO core reads configuration afterwards.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::sso::provider::ProviderConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// SSO provider and state configuration
    #[serde(default)]
    pub sso: SsoConfig,

    /// Host session token configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Redis configuration (optional, durable state store backend)
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// SSO configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Front-end base URL the final redirect lands on
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Timeout for token exchange and user-info calls in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for OIDC discovery, exchange and verification in seconds
    #[serde(default = "default_oidc_timeout")]
    pub oidc_discovery_timeout_secs: u64,

    /// State token settings
    #[serde(default)]
    pub state: StateConfig,

    /// GitHub provider settings
    #[serde(default)]
    pub github: Option<ProviderSettings>,

    /// Google provider settings
    #[serde(default)]
    pub google: Option<ProviderSettings>,

    /// Generic OIDC provider settings (requires `issuer_url`)
    #[serde(default)]
    pub oidc: Option<ProviderSettings>,

    /// Accounts seeded into the in-memory user store
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// State token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Lifetime of a state token in the durable store (default: 600 = 10 min)
    #[serde(default = "default_state_ttl")]
    pub ttl_secs: u64,

    /// Grace period of the process-local fallback cache (default: 120)
    #[serde(default = "default_cache_grace")]
    pub cache_grace_secs: u64,

    /// Durable store backend: "memory" or "redis"
    #[serde(default = "default_state_backend")]
    pub backend: String,
}

/// Individual provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Callback URL registered with the provider
    pub redirect_url: String,

    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Issuer URL (OIDC only)
    #[serde(default)]
    pub issuer_url: Option<String>,

    /// Scopes to request instead of the provider defaults
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Authorization endpoint override
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Token endpoint override
    #[serde(default)]
    pub token_url: Option<String>,

    /// User-info endpoint override
    #[serde(default)]
    pub userinfo_url: Option<String>,
}

/// Account seeded into the in-memory user store at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    /// Login name or email
    pub username: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub is_super_admin: bool,
}

/// Host session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to a 32-byte PASETO v4.local key; a random key is used when absent
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Session token lifetime in seconds (default: 86400 = 24h)
    #[serde(default = "default_session_lifetime")]
    pub lifetime_secs: u64,

    /// Issuer claim
    #[serde(default)]
    pub issuer: Option<String>,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    /// Key prefix for state tokens
    #[serde(default = "default_redis_prefix")]
    pub key_prefix: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            frontend_url: default_frontend_url(),
            http_timeout_secs: default_http_timeout(),
            oidc_discovery_timeout_secs: default_oidc_timeout(),
            state: StateConfig::default(),
            github: None,
            google: None,
            oidc: None,
            users: Vec::new(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_state_ttl(),
            cache_grace_secs: default_cache_grace(),
            backend: default_state_backend(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_path: None,
            lifetime_secs: default_session_lifetime(),
            issuer: None,
        }
    }
}

impl StateConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cache_grace(&self) -> Duration {
        Duration::from_secs(self.cache_grace_secs)
    }
}

impl SsoConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn oidc_discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.oidc_discovery_timeout_secs)
    }
}

impl From<&ProviderSettings> for ProviderConfig {
    fn from(settings: &ProviderSettings) -> Self {
        ProviderConfig {
            redirect_url: settings.redirect_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            issuer_url: settings.issuer_url.clone(),
            scopes: settings.scopes.clone(),
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
            userinfo_url: settings.userinfo_url.clone(),
        }
    }
}

// Default value functions

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_frontend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_oidc_timeout() -> u64 {
    10
}

fn default_state_ttl() -> u64 {
    600 // 10 minutes
}

fn default_cache_grace() -> u64 {
    120
}

fn default_state_backend() -> String {
    "memory".to_string()
}

fn default_session_lifetime() -> u64 {
    86400
}

fn default_redis_max_connections() -> usize {
    16
}

fn default_redis_prefix() -> String {
    "sso:state:".to_string()
}

impl Config {
    /// Load configuration from ./config.toml and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file, overridden by the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
        }

        let config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Load from config file (if exists)
            .merge(Toml::file(path))
            // Override with environment variables
            .merge(Env::prefixed("SSO_BRIDGE_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Names of the providers that have settings present
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.sso.github.is_some() {
            enabled.push("github");
        }
        if self.sso.google.is_some() {
            enabled.push("google");
        }
        if self.sso.oidc.is_some() {
            enabled.push("oidc");
        }
        enabled
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "sso-bridge".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
            },
            sso: SsoConfig::default(),
            session: SessionConfig::default(),
            redis: None,
        }
    }
}
