//! In-memory user store
//!
//! Reference [`UserStore`] for single-instance deployments and tests,
//! seeded from `sso.users` at startup.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::SeedUser;
use crate::error::{Error, Result};
use crate::sso::bridge::{HostUser, UserStore};

#[derive(Debug, Clone)]
struct StoredUser {
    user: HostUser,
    is_sso: bool,
}

/// DashMap-backed user store
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<String, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding the configured accounts as local (non-SSO) users
    pub fn from_seeds(seeds: &[SeedUser]) -> Self {
        let store = Self::new();
        for seed in seeds {
            store.insert(HostUser {
                username: seed.username.clone(),
                is_admin: seed.is_admin,
                is_super_admin: seed.is_super_admin,
            });
        }
        store
    }

    /// Insert or replace a local account
    pub fn insert(&self, user: HostUser) {
        self.users.insert(
            user.username.clone(),
            StoredUser {
                user,
                is_sso: false,
            },
        );
    }

    /// Whether the account was created through SSO; `None` when unknown
    pub fn is_sso_account(&self, username: &str) -> Option<bool> {
        self.users.get(username).map(|entry| entry.is_sso)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, username: &str) -> Result<Option<HostUser>> {
        Ok(self.users.get(username).map(|entry| entry.user.clone()))
    }

    async fn create_user(&self, username: &str, is_sso: bool) -> Result<()> {
        if username.is_empty() {
            return Err(Error::UserCreationFailed("username is empty".to_string()));
        }

        use dashmap::mapref::entry::Entry;
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(Error::UserCreationFailed(format!(
                "user {} already exists",
                username
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StoredUser {
                    user: HostUser {
                        username: username.to_string(),
                        is_admin: false,
                        is_super_admin: false,
                    },
                    is_sso,
                });
                tracing::debug!(username = %username, is_sso, "user created");
                Ok(())
            }
        }
    }
}
