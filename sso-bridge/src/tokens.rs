//! PASETO session issuer
//!
//! Reference [`SessionIssuer`] minting PASETO V4 local tokens. The login
//! transaction's one-time password is bound as the token identifier (`jti`),
//! so the host can reject a token replayed outside its transaction.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusty_paseto::prelude::*;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::sso::bridge::SessionIssuer;

/// Claims carried by a host session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub username: String,
    pub jti: String,
    pub iss: Option<String>,
}

/// Session issuer backed by a V4 local (symmetric) key
#[derive(Clone)]
pub struct PasetoSessionIssuer {
    key_bytes: Arc<[u8; 32]>,
    lifetime: Duration,
    issuer: Option<String>,
}

impl PasetoSessionIssuer {
    /// Create an issuer with a symmetric key
    pub fn with_symmetric_key(key: [u8; 32], lifetime: Duration) -> Self {
        Self {
            key_bytes: Arc::new(key),
            lifetime,
            issuer: None,
        }
    }

    /// Create an issuer with a random per-process key
    ///
    /// Tokens do not survive a restart.
    pub fn ephemeral(lifetime: Duration) -> Self {
        use rand::Rng;
        Self::with_symmetric_key(rand::rng().random(), lifetime)
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Build from configuration, reading the key file when one is set
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let lifetime = Duration::from_secs(config.lifetime_secs);

        let issuer = match config.key_path {
            Some(ref key_path) => {
                let key_bytes = fs::read(key_path).map_err(|e| {
                    Error::Config(Box::new(figment::Error::from(format!(
                        "Failed to read PASETO key file '{}': {}",
                        key_path.display(),
                        e
                    ))))
                })?;

                let key: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
                    Error::Config(Box::new(figment::Error::from(format!(
                        "V4 local key must be exactly 32 bytes, got {} bytes. \
                        Generate with: head -c 32 /dev/urandom > {}",
                        key_bytes.len(),
                        key_path.display()
                    ))))
                })?;
                Self::with_symmetric_key(key, lifetime)
            }
            None => {
                tracing::warn!("no session key configured, using an ephemeral key");
                Self::ephemeral(lifetime)
            }
        };

        Ok(match config.issuer {
            Some(ref iss) => issuer.with_issuer(iss.clone()),
            None => issuer,
        })
    }

    fn key(&self) -> PasetoSymmetricKey<V4, Local> {
        PasetoSymmetricKey::<V4, Local>::from(Key::from(&*self.key_bytes))
    }

    fn generate(&self, username: &str, jti: &str) -> Result<String> {
        let now = Utc::now();
        let exp = i64::try_from(self.lifetime.as_secs())
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::SessionIssuanceFailed(format!(
                    "session lifetime of {}s is out of range",
                    self.lifetime.as_secs()
                ))
            })?;
        let exp = exp.to_rfc3339();
        let iat = now.to_rfc3339();

        let mut builder = PasetoBuilder::<V4, Local>::default();
        builder.set_claim(SubjectClaim::from(username));
        builder.set_claim(
            ExpirationClaim::try_from(exp.as_str())
                .map_err(|e| Error::SessionIssuanceFailed(format!("Invalid expiration: {}", e)))?,
        );
        builder.set_claim(
            IssuedAtClaim::try_from(iat.as_str())
                .map_err(|e| Error::SessionIssuanceFailed(format!("Invalid issued at: {}", e)))?,
        );
        builder.set_claim(TokenIdentifierClaim::from(jti));
        if let Some(ref iss) = self.issuer {
            builder.set_claim(IssuerClaim::from(iss.as_str()));
        }
        builder.set_claim(
            CustomClaim::try_from(("username", username)).map_err(|e| {
                Error::SessionIssuanceFailed(format!("Invalid username claim: {}", e))
            })?,
        );

        builder
            .build(&self.key())
            .map_err(|e| Error::SessionIssuanceFailed(format!("Failed to build PASETO token: {}", e)))
    }

    /// Decrypt and check a session token minted by this issuer
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut parser = PasetoParser::<V4, Local>::default();
        if let Some(ref iss) = self.issuer {
            parser.check_claim(IssuerClaim::from(iss.as_str()));
        }

        let json = parser.parse(token, &self.key()).map_err(|e| {
            Error::IdentityVerificationFailed(format!("Invalid session token: {}", e))
        })?;

        let field = |name: &str| json[name].as_str().map(String::from);
        let missing =
            |name: &str| Error::IdentityVerificationFailed(format!("session token missing {}", name));

        Ok(SessionClaims {
            sub: field("sub").ok_or_else(|| missing("sub"))?,
            username: field("username").ok_or_else(|| missing("username"))?,
            jti: field("jti").ok_or_else(|| missing("jti"))?,
            iss: field("iss"),
        })
    }
}

#[async_trait]
impl SessionIssuer for PasetoSessionIssuer {
    async fn issue_session(&self, username: &str, one_time_password: &str) -> Result<String> {
        if one_time_password.is_empty() {
            return Err(Error::SessionIssuanceFailed(
                "one-time password must not be empty".to_string(),
            ));
        }
        self.generate(username, one_time_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const KEY: [u8; 32] = [0x42; 32];

    #[tokio::test]
    async fn test_issue_and_verify() {
        let issuer = PasetoSessionIssuer::with_symmetric_key(KEY, Duration::from_secs(3600))
            .with_issuer("sso-bridge");

        let token = issuer.issue_session("alice", "otp-123").await.unwrap();
        assert!(token.starts_with("v4.local."));

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.jti, "otp-123");
        assert_eq!(claims.iss.as_deref(), Some("sso-bridge"));
    }

    #[tokio::test]
    async fn test_empty_one_time_password_rejected() {
        let issuer = PasetoSessionIssuer::with_symmetric_key(KEY, Duration::from_secs(60));
        let err = issuer.issue_session("alice", "").await.unwrap_err();
        assert!(matches!(err, Error::SessionIssuanceFailed(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_rejected() {
        for secs in [u64::MAX, i64::MAX as u64, i64::MAX as u64 / 1000 + 1] {
            let issuer = PasetoSessionIssuer::with_symmetric_key(KEY, Duration::from_secs(secs));
            let err = issuer.issue_session("alice", "otp").await.unwrap_err();
            assert!(matches!(err, Error::SessionIssuanceFailed(_)), "{}", secs);
        }
    }

    #[tokio::test]
    async fn test_token_from_other_key_rejected() {
        let minted = PasetoSessionIssuer::with_symmetric_key(KEY, Duration::from_secs(60))
            .issue_session("alice", "otp")
            .await
            .unwrap();

        let other = PasetoSessionIssuer::with_symmetric_key([0x07; 32], Duration::from_secs(60));
        assert!(other.verify(&minted).is_err());
    }

    #[test]
    fn test_from_config_reads_key_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&KEY).unwrap();

        let config = SessionConfig {
            key_path: Some(file.path().to_path_buf()),
            lifetime_secs: 60,
            issuer: None,
        };
        let issuer = PasetoSessionIssuer::from_config(&config).unwrap();
        let expected = PasetoSessionIssuer::with_symmetric_key(KEY, Duration::from_secs(60));
        assert_eq!(issuer.key_bytes, expected.key_bytes);
    }

    #[test]
    fn test_from_config_rejects_short_key() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 16]).unwrap();

        let config = SessionConfig {
            key_path: Some(file.path().to_path_buf()),
            lifetime_secs: 60,
            issuer: None,
        };
        let err = PasetoSessionIssuer::from_config(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
