//! Shared fakes and helpers for the login flow tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use oauth2::url::Url;
use tower::ServiceExt;

use sso_bridge::prelude::*;
use sso_bridge::sso::InMemoryStateStore;

/// User store that counts every call
#[derive(Default)]
pub struct CountingUsers {
    users: Mutex<HashMap<String, HostUser>>,
    /// Accounts created on first login get the admin flag
    provision_admins: bool,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl CountingUsers {
    pub fn provisioning_admins() -> Self {
        Self {
            provision_admins: true,
            ..Self::default()
        }
    }

    pub fn with_user(self, username: &str, is_admin: bool) -> Self {
        self.users.lock().unwrap().insert(
            username.to_string(),
            HostUser {
                username: username.to_string(),
                is_admin,
                is_super_admin: false,
            },
        );
        self
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for CountingUsers {
    async fn get_user(&self, username: &str) -> Result<Option<HostUser>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn create_user(&self, username: &str, _is_sso: bool) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.users.lock().unwrap().insert(
            username.to_string(),
            HostUser {
                username: username.to_string(),
                is_admin: self.provision_admins,
                is_super_admin: false,
            },
        );
        Ok(())
    }
}

/// Session issuer that counts calls and returns a fixed token
#[derive(Default)]
pub struct CountingIssuer {
    pub calls: AtomicUsize,
    unavailable: bool,
}

impl CountingIssuer {
    /// Issuer that refuses every session
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionIssuer for CountingIssuer {
    async fn issue_session(&self, username: &str, one_time_password: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::SessionIssuanceFailed("signing key unavailable".into()));
        }
        if one_time_password.is_empty() {
            return Err(Error::SessionIssuanceFailed("empty one-time password".into()));
        }
        Ok(format!("session.{}", username))
    }
}

pub const FRONTEND_URL: &str = "https://netops.example.com";

/// Wire one provider, the fakes and an in-memory state store into a router
pub fn app(
    provider: Arc<dyn SsoProvider>,
    users: Arc<CountingUsers>,
    issuer: Arc<CountingIssuer>,
) -> Router {
    let states = StateTokenService::new(
        Arc::new(InMemoryStateStore::new(Duration::from_secs(600))),
        Duration::from_secs(120),
    );
    let bridge = SessionBridge::new(users, issuer, FRONTEND_URL).unwrap();
    let registry = ProviderRegistry::new().register(provider);

    SsoService::new(registry, SsoContext::new(states, bridge)).router()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub fn location(response: &Response<Body>) -> Url {
    let value = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap();
    Url::parse(value).unwrap()
}

pub fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Run `/login/{provider}` and return the state embedded in the provider URL
pub async fn start_login(app: &Router, provider: &str) -> (Url, String) {
    let response = get(app, &format!("/login/{}", provider)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    let state = query(&url)
        .remove("state")
        .expect("authorization URL without state");
    (url, state)
}

pub async fn error_code(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
    parsed.code.unwrap_or_default()
}
