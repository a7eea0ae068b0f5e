//! # sso-bridge
//!
//! Single-sign-on bridge letting operators log into a host application
//! through GitHub, Google or any OpenID Connect issuer.
//!
//! The [`sso`] module holds the provider-agnostic core: the anti-CSRF state
//! protocol, one adapter per provider behind the [`sso::SsoProvider`] trait, a
//! read-only provider registry and the [`sso::SessionBridge`] that provisions
//! the local account and mints the session token. The host plugs in its own
//! [`sso::UserStore`] and [`sso::SessionIssuer`]; in-memory and PASETO
//! reference implementations ship in [`users`] and [`tokens`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use sso_bridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let app = SsoService::from_config(&config).await?.router();
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod service;
pub mod sso;
pub mod tokens;
pub mod users;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, ProviderSettings, SeedUser, SsoConfig};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::observability::init_tracing;
    pub use crate::server::Server;
    pub use crate::service::SsoService;
    pub use crate::sso::{
        HostUser, OAuthUser, ProviderConfig, ProviderKind, ProviderRegistry, SessionBridge,
        SessionIssuer, SsoContext, SsoProvider, StateTokenService, UserStore,
    };
    pub use crate::tokens::PasetoSessionIssuer;
    pub use crate::users::InMemoryUserStore;

    pub use axum::Router;
}
