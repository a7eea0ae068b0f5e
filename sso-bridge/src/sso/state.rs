//! OAuth state management for CSRF protection
//!
//! A state token is issued per login attempt, registered in a durable
//! [`StateStore`], and mirrored into a process-local [`StateCache`] for a
//! short grace period. Validation accepts a token known to either tier, so a
//! store eviction racing an in-flight login does not lose the transaction. A
//! token absent from both tiers is rejected, and a validated token is consumed
//! in both tiers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Error, Result};

/// Durable state store contract
///
/// Implementations must make `is_state_valid` consuming: a token reported
/// valid once is gone afterwards.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// How long a registered token stays pending
    fn ttl(&self) -> Duration;

    /// Register a newly issued state token as pending
    async fn set_state(&self, token: &str) -> Result<()>;

    /// Consume a state token
    ///
    /// Returns the stored value when the token was pending and unexpired.
    async fn is_state_valid(&self, token: &str) -> Result<Option<String>>;
}

/// Generate a cryptographically secure random state value
pub fn generate_state() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    base64_url_encode(&bytes)
}

/// Base64 URL-safe encoding without padding
fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(bytes)
}

/// In-process durable store with per-token TTL
///
/// Suitable for single-instance deployments and tests. Expired entries are
/// purged lazily on every write.
#[derive(Clone)]
pub struct InMemoryStateStore {
    entries: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl InMemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Number of pending (possibly expired) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn set_state(&self, token: &str) -> Result<()> {
        let now = Instant::now();
        self.entries.retain(|_, expires_at| *expires_at > now);
        self.entries.insert(token.to_string(), now + self.ttl);
        Ok(())
    }

    async fn is_state_valid(&self, token: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .remove(token)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(stored, _)| stored))
    }
}

/// Outcome of presenting a token to the local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Token was pending and is now marked consumed
    Claimed,
    /// Token was already consumed by an earlier validation
    Replayed,
    /// Token is not (or no longer) held locally
    Unknown,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Pending(Instant),
    Consumed(Instant),
}

impl Slot {
    fn expires_at(&self) -> Instant {
        match self {
            Slot::Pending(at) | Slot::Consumed(at) => *at,
        }
    }
}

/// Process-local fallback cache
///
/// Guarded by a mutex since many login attempts issue and validate
/// concurrently. Pending tokens are held for the grace period. Consumed
/// tokens stay as tombstones for `tombstone_ttl`, which must cover the
/// durable store's TTL: a claim whose durable lookup failed leaves the
/// durable entry behind, and the tombstone is what rejects its replay.
pub struct StateCache {
    entries: Mutex<HashMap<String, Slot>>,
    grace: Duration,
    tombstone_ttl: Duration,
}

impl StateCache {
    pub fn new(grace: Duration, tombstone_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            grace,
            tombstone_ttl: tombstone_ttl.max(grace),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hold a token for the grace period
    pub fn insert(&self, token: &str) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, slot| slot.expires_at() > now);
        entries.insert(token.to_string(), Slot::Pending(now + self.grace));
    }

    /// Claim a token, leaving a tombstone behind
    pub fn claim(&self, token: &str) -> CacheOutcome {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(token).copied() {
            Some(slot) if slot.expires_at() <= now => {
                entries.remove(token);
                CacheOutcome::Unknown
            }
            Some(Slot::Pending(_)) => {
                entries.insert(token.to_string(), Slot::Consumed(now + self.tombstone_ttl));
                CacheOutcome::Claimed
            }
            Some(Slot::Consumed(_)) => CacheOutcome::Replayed,
            None => CacheOutcome::Unknown,
        }
    }
}

/// State token service: issue and two-tier validate
#[derive(Clone)]
pub struct StateTokenService {
    store: Arc<dyn StateStore>,
    cache: Arc<StateCache>,
}

impl StateTokenService {
    /// Create a service over a durable store and a fallback grace period
    pub fn new(store: Arc<dyn StateStore>, cache_grace: Duration) -> Self {
        let tombstone_ttl = store.ttl();
        Self {
            store,
            cache: Arc::new(StateCache::new(cache_grace, tombstone_ttl)),
        }
    }

    /// Issue a new state token for one login attempt
    pub async fn issue(&self) -> Result<String> {
        let token = generate_state();
        self.register(&token).await?;
        Ok(token)
    }

    /// Register a token from [`generate_state`] in both tiers
    ///
    /// A store failure aborts the login as not configured; the flow never
    /// proceeds without a registered state token.
    pub async fn register(&self, token: &str) -> Result<()> {
        self.store.set_state(token).await.map_err(|e| {
            tracing::error!(error = %e, "failed to register oauth state");
            Error::NotConfigured(format!("state store unavailable: {}", e))
        })?;
        self.cache.insert(token);
        Ok(())
    }

    /// Validate and consume a presented state token
    ///
    /// Both tiers are consumed on every attempt. The local tombstone rejects
    /// replays even while a durable lookup for the same token is in flight.
    pub async fn validate(&self, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }

        let local = self.cache.claim(presented);
        if local == CacheOutcome::Replayed {
            tracing::warn!("rejecting replayed oauth state");
            return false;
        }

        let durable = match self.store.is_state_valid(presented).await {
            Ok(stored) => stored.is_some_and(|stored| stored == presented),
            Err(e) => {
                tracing::warn!(error = %e, "state store lookup failed, checking local cache");
                false
            }
        };

        durable || local == CacheOutcome::Claimed
    }
}

// Redis state store implementation
#[cfg(feature = "cache")]
mod redis_impl {
    use super::*;
    use deadpool_redis::Pool as RedisPool;

    /// Redis-backed durable state store
    ///
    /// Stores state tokens with automatic TTL expiration and consumes them
    /// atomically with GETDEL.
    #[derive(Clone)]
    pub struct RedisStateStore {
        pool: RedisPool,
        key_prefix: String,
        ttl_secs: u64,
    }

    impl RedisStateStore {
        /// Create a new Redis state store
        pub fn new(pool: RedisPool, ttl_secs: u64, prefix: impl Into<String>) -> Self {
            Self {
                pool,
                key_prefix: prefix.into(),
                ttl_secs,
            }
        }

        /// Build a pool from configuration and wrap it
        pub fn from_config(config: &crate::config::RedisConfig, ttl_secs: u64) -> Result<Self> {
            let mut pool_config = deadpool_redis::Config::from_url(config.url.clone());
            pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.max_connections));
            let pool = pool_config
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .map_err(|e| Error::StateStore(format!("Failed to create Redis pool: {}", e)))?;
            Ok(Self::new(pool, ttl_secs, config.key_prefix.clone()))
        }

        fn state_key(&self, state: &str) -> String {
            format!("{}{}", self.key_prefix, state)
        }
    }

    #[async_trait]
    impl StateStore for RedisStateStore {
        fn ttl(&self) -> Duration {
            Duration::from_secs(self.ttl_secs)
        }

        async fn set_state(&self, token: &str) -> Result<()> {
            use deadpool_redis::redis::AsyncCommands;

            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|e| Error::StateStore(format!("Failed to get Redis connection: {}", e)))?;

            conn.set_ex::<_, _, ()>(self.state_key(token), token, self.ttl_secs)
                .await?;
            Ok(())
        }

        async fn is_state_valid(&self, token: &str) -> Result<Option<String>> {
            use deadpool_redis::redis::AsyncCommands;

            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|e| Error::StateStore(format!("Failed to get Redis connection: {}", e)))?;

            // Get and delete atomically (GETDEL command)
            let stored: Option<String> = conn.get_del(self.state_key(token)).await?;
            Ok(stored)
        }
    }
}

#[cfg(feature = "cache")]
pub use redis_impl::RedisStateStore;
