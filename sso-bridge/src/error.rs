//! Error types and HTTP response conversion
//!
//! Every failure in the login/callback flow is converted into a terminal
//! HTTP response at the point of detection. Nothing here escalates into a
//! process-level fault.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SSO bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Provider was never initialized, discovery failed, the name is unknown,
    /// or the state store could not register a new login attempt
    #[error("OAuth provider not configured: {0}")]
    NotConfigured(String),

    /// CSRF state token missing, expired, or already consumed
    #[error("invalid oauth state")]
    InvalidState,

    /// Code-for-token exchange rejected by the provider
    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    /// Provider payload lacked the identifying field or was not parseable
    #[error("malformed identity payload: {0}")]
    MalformedIdentity(String),

    /// ID token signature, issuer, audience or claims failed to verify
    #[error("identity verification failed: {0}")]
    IdentityVerificationFailed(String),

    /// User store could not resolve the account
    #[error("user lookup failed: {0}")]
    UserLookupFailed(String),

    /// User store refused to provision a new SSO account
    #[error("user creation failed: {0}")]
    UserCreationFailed(String),

    /// Authenticated, but the account is not admin-class
    #[error("user {0} is not allowed to log in via SSO")]
    UserNotAllowed(String),

    /// Host credential issuer refused to mint a session token
    #[error("session issuance failed: {0}")]
    SessionIssuanceFailed(String),

    /// Durable state store failure
    #[error("state store error: {0}")]
    StateStore(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Redis error
    #[cfg(feature = "cache")]
    #[error("Redis error: {0}")]
    Redis(Box<redis::RedisError>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code for this error kind
    pub fn kind_code(&self) -> &'static str {
        match self {
            Error::NotConfigured(_) => "NOT_CONFIGURED",
            Error::InvalidState => "INVALID_STATE",
            Error::ExchangeFailed(_) => "EXCHANGE_FAILED",
            Error::MalformedIdentity(_) => "MALFORMED_IDENTITY",
            Error::IdentityVerificationFailed(_) => "IDENTITY_VERIFICATION_FAILED",
            Error::UserLookupFailed(_) => "USER_LOOKUP_FAILED",
            Error::UserCreationFailed(_) => "USER_CREATION_FAILED",
            Error::UserNotAllowed(_) => "USER_NOT_ALLOWED",
            Error::SessionIssuanceFailed(_) => "SESSION_ISSUANCE_FAILED",
            Error::StateStore(_) => "STATE_STORE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            #[cfg(feature = "cache")]
            Error::Redis(_) => "CACHE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error is rendered with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidState => StatusCode::BAD_REQUEST,
            Error::ExchangeFailed(_) | Error::MalformedIdentity(_) => StatusCode::BAD_GATEWAY,
            Error::IdentityVerificationFailed(_) => StatusCode::UNAUTHORIZED,
            Error::UserNotAllowed(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.kind_code();

        // Upstream and user-facing rejections keep their message; server-side
        // faults are logged and replaced with a generic body.
        let message = match &self {
            Error::NotConfigured(reason) => {
                tracing::warn!(reason = %reason, "OAuth provider not configured");
                "OAuth provider is not configured".to_string()
            }
            Error::InvalidState => self.to_string(),
            Error::ExchangeFailed(_)
            | Error::MalformedIdentity(_)
            | Error::IdentityVerificationFailed(_) => {
                tracing::warn!(error = %self, "SSO identity retrieval failed");
                "Failed to retrieve identity from provider".to_string()
            }
            Error::UserNotAllowed(username) => {
                tracing::info!(username = %username, "SSO login denied for non-admin user");
                "User is not allowed to log in via SSO".to_string()
            }
            Error::UserLookupFailed(_) | Error::UserCreationFailed(_) => {
                tracing::error!(error = %self, "SSO user provisioning failed");
                "User not found".to_string()
            }
            _ => {
                tracing::error!(error = %self, "SSO request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(ErrorResponse::with_code(status, code, message))).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let response = ErrorResponse::new(StatusCode::NOT_FOUND, "Resource not found");
        assert_eq!(response.status, 404);
        assert_eq!(response.error, "Resource not found");
        assert!(response.code.is_none());
    }

    #[test]
    fn test_error_response_with_code() {
        let response =
            ErrorResponse::with_code(StatusCode::FORBIDDEN, "USER_NOT_ALLOWED", "denied");
        assert_eq!(response.status, 403);
        assert_eq!(response.code.as_deref(), Some("USER_NOT_ALLOWED"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::NotConfigured("github".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(Error::InvalidState.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::IdentityVerificationFailed("bad signature".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::UserNotAllowed("bob".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::SessionIssuanceFailed("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_state_message() {
        assert_eq!(Error::InvalidState.to_string(), "invalid oauth state");
        assert_eq!(Error::InvalidState.kind_code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_internal_details_not_exposed() {
        let response = Error::Internal("db password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("INTERNAL_ERROR"));
        assert!(!parsed.error.contains("hunter2"));
    }
}
