//! HTTP surface
//!
//! `GET /login/{provider}` and `GET /callback/{provider}` look the provider up
//! in the registry and hand over to its adapter; no route knows about a
//! specific provider. Errors render through [`Error`]'s `IntoResponse`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sso::{
    CallbackParams, InMemoryStateStore, ProviderRegistry, SessionBridge, SessionIssuer,
    SsoContext, StateStore, StateTokenService, UserStore,
};
use crate::tokens::PasetoSessionIssuer;
use crate::users::InMemoryUserStore;

/// Shared router state
#[derive(Clone)]
pub struct SsoService {
    registry: Arc<ProviderRegistry>,
    ctx: SsoContext,
}

impl SsoService {
    pub fn new(registry: ProviderRegistry, ctx: SsoContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
        }
    }

    /// Assemble the service from configuration with the given collaborators
    pub async fn with_collaborators(
        config: &Config,
        users: Arc<dyn UserStore>,
        issuer: Arc<dyn SessionIssuer>,
    ) -> Result<Self> {
        let sso = &config.sso;
        let store = state_store(config)?;
        let states = StateTokenService::new(store, sso.state.cache_grace());
        let bridge = SessionBridge::new(users, issuer, &sso.frontend_url)?;
        let registry = ProviderRegistry::from_config(sso).await?;

        Ok(Self::new(registry, SsoContext::new(states, bridge)))
    }

    /// Assemble the service with the in-memory user store and PASETO issuer
    pub async fn from_config(config: &Config) -> Result<Self> {
        let users = Arc::new(InMemoryUserStore::from_seeds(&config.sso.users));
        let issuer = Arc::new(PasetoSessionIssuer::from_config(&config.session)?);
        Self::with_collaborators(config, users, issuer).await
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn context(&self) -> &SsoContext {
        &self.ctx
    }

    /// Build the router
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/login/{provider}", get(login))
            .route("/callback/{provider}", get(callback))
            .with_state(self)
    }
}

fn state_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    let state = &config.sso.state;
    match state.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStateStore::new(state.ttl()))),
        #[cfg(feature = "cache")]
        "redis" => {
            let redis = config.redis.as_ref().ok_or_else(|| {
                Error::Config(Box::new(figment::Error::from(
                    "sso.state.backend is \"redis\" but [redis] is not configured".to_string(),
                )))
            })?;
            Ok(Arc::new(crate::sso::RedisStateStore::from_config(
                redis,
                state.ttl_secs,
            )?))
        }
        other => Err(Error::Config(Box::new(figment::Error::from(format!(
            "unsupported state backend: {}",
            other
        ))))),
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };
    (StatusCode::OK, Json(response))
}

async fn login(State(service): State<SsoService>, Path(provider): Path<String>) -> Result<Redirect> {
    let adapter = service.registry.get(&provider)?;
    adapter.handle_login(&service.ctx).await
}

async fn callback(
    State(service): State<SsoService>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let adapter = service.registry.get(&provider)?;
    adapter.handle_callback(&service.ctx, params).await
}
