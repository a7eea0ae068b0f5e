//! Identity normalization
//!
//! Converts each provider's raw user-info payload into one canonical
//! [`OAuthUser`]. GitHub keys off `login`; Google and OIDC key off `email`.
//! A missing or malformed identifying field is a hard failure, never a
//! default substitution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::provider::{OAuthTokens, ProviderKind};

/// Canonical identity produced by a successful callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUser {
    /// Login name (GitHub) or email (Google, OIDC)
    pub primary_identifier: String,

    /// JSON serialization of the provider token record
    pub access_token: String,

    /// Raw provider payload or verified ID token claims
    pub raw_claims: Value,
}

impl OAuthUser {
    /// Attach the provider token material for downstream auditing
    pub fn with_tokens(mut self, tokens: &OAuthTokens) -> Result<Self> {
        self.access_token = serde_json::to_string(tokens)
            .map_err(|e| Error::Internal(format!("failed to convert token to json: {}", e)))?;
        Ok(self)
    }
}

/// Normalize a provider payload into an [`OAuthUser`]
pub fn normalize(kind: ProviderKind, raw: Value) -> Result<OAuthUser> {
    let field = kind.identity_field();

    let identifier = match raw.get(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => value.clone(),
        Some(Value::String(_)) => return Err(parse_failure(kind, format!("empty `{}`", field))),
        Some(other) => {
            return Err(parse_failure(
                kind,
                format!("`{}` is not a string: {}", field, type_name(other)),
            ))
        }
        None => return Err(parse_failure(kind, format!("missing `{}`", field))),
    };

    Ok(OAuthUser {
        primary_identifier: identifier,
        access_token: String::new(),
        raw_claims: raw,
    })
}

/// OIDC claims are only ever normalized after signature verification, so a
/// claim failure there is a verification failure.
fn parse_failure(kind: ProviderKind, reason: String) -> Error {
    match kind {
        ProviderKind::Oidc => Error::IdentityVerificationFailed(format!(
            "error when claiming OIDC user: {}",
            reason
        )),
        _ => Error::MalformedIdentity(format!("{} user info: {}", kind.display_name(), reason)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_github_uses_login() {
        let user = normalize(
            ProviderKind::Github,
            json!({"login": "alice", "email": "alice@example.com", "id": 1}),
        )
        .unwrap();
        assert_eq!(user.primary_identifier, "alice");
        assert_eq!(user.raw_claims["id"], 1);
        assert!(user.access_token.is_empty());
    }

    #[test]
    fn test_google_and_oidc_use_email() {
        let payload = json!({"login": "ignored", "email": "bob@example.com"});
        let google = normalize(ProviderKind::Google, payload.clone()).unwrap();
        let oidc = normalize(ProviderKind::Oidc, payload).unwrap();
        assert_eq!(google.primary_identifier, "bob@example.com");
        assert_eq!(oidc.primary_identifier, "bob@example.com");
    }

    #[test]
    fn test_missing_field_is_hard_failure() {
        let err = normalize(ProviderKind::Github, json!({"email": "a@b.c"})).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));

        let err = normalize(ProviderKind::Google, json!({"email": 42})).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));

        let err = normalize(ProviderKind::Google, json!({"email": ""})).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));
    }

    #[test]
    fn test_oidc_claim_failure_is_verification_failure() {
        let err = normalize(ProviderKind::Oidc, json!({"sub": "123"})).unwrap_err();
        assert!(matches!(err, Error::IdentityVerificationFailed(_)));
    }

    #[test]
    fn test_with_tokens_serializes_record() {
        let tokens = OAuthTokens {
            access_token: "gho_abc".to_string(),
            token_type: "bearer".to_string(),
            refresh_token: None,
            expiry: None,
            id_token: None,
        };
        let user = normalize(ProviderKind::Github, json!({"login": "alice"}))
            .unwrap()
            .with_tokens(&tokens)
            .unwrap();

        let blob: Value = serde_json::from_str(&user.access_token).unwrap();
        assert_eq!(blob["access_token"], "gho_abc");
    }
}
