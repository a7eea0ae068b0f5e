//! Provider-agnostic OAuth/OIDC login orchestration
//!
//! A login runs in two requests. `handle_login` issues a state token and
//! redirects to the provider; `handle_callback` validates the state, exchanges
//! the code, normalizes the identity and hands it to the [`SessionBridge`],
//! which provisions the account and mints the host session token.

pub mod bridge;
pub mod identity;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod state;

pub use bridge::{generate_one_time_password, HostUser, SessionBridge, SessionGrant, SessionIssuer, UserStore};
pub use identity::{normalize, OAuthUser};
pub use provider::{CallbackParams, OAuthTokens, ProviderConfig, ProviderKind, SsoContext, SsoProvider};
pub use providers::{GitHubProvider, GoogleProvider, OidcProvider};
pub use registry::ProviderRegistry;
pub use state::{generate_state, CacheOutcome, InMemoryStateStore, StateCache, StateStore, StateTokenService};

#[cfg(feature = "cache")]
pub use state::RedisStateStore;
