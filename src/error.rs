//! Login error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::router::LOGIN_PATH;

/// Maximum length of a provider-supplied error message rendered to the user.
const MAX_PROVIDER_MESSAGE_LEN: usize = 200;

/// Login flow errors.
///
/// Every failure in the callback path is terminal for that request: there is
/// no retry and no partial session. The response body always carries a link
/// back to the manual login entry point.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login is not configured")]
    NotReady,

    #[error("the identity provider returned an error")]
    ProviderError {
        error: String,
        description: Option<String>,
    },

    #[error("no ID token found in the callback")]
    MissingToken,

    #[error("invalid ID token: {0}")]
    MalformedToken(String),

    #[error("ID token issuer does not match the configured tenant")]
    InvalidIssuer,

    #[error("ID token audience does not match the configured client")]
    InvalidAudience,

    #[error("invalid nonce")]
    InvalidNonce,

    #[error("no user ID (sub) found in the ID token")]
    MissingSubject,

    #[error("no email address returned in the ID token")]
    MissingEmail,

    #[error("email address is not verified")]
    EmailNotVerified,

    #[error("ID token has already expired")]
    TokenAlreadyExpired,

    #[error("more than one user found with this provider subject")]
    DuplicateIdentityMapping { subject: String },

    #[error("error finding or creating a user: {0}")]
    UserResolutionFailed(String),

    #[error("failed to fetch identity provider keys: {0}")]
    JwksFetchFailed(String),

    #[error("no matching signing key found: {0}")]
    JwksKeyNotFound(String),
}

impl LoginError {
    /// Error code used in API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            LoginError::NotReady => "not_ready",
            LoginError::ProviderError { .. } => "provider_error",
            LoginError::MissingToken => "missing_token",
            LoginError::MalformedToken(_) => "malformed_token",
            LoginError::InvalidIssuer => "invalid_issuer",
            LoginError::InvalidAudience => "invalid_audience",
            LoginError::InvalidNonce => "invalid_nonce",
            LoginError::MissingSubject => "missing_subject",
            LoginError::MissingEmail => "missing_email",
            LoginError::EmailNotVerified => "email_not_verified",
            LoginError::TokenAlreadyExpired => "token_already_expired",
            LoginError::DuplicateIdentityMapping { .. } => "duplicate_identity_mapping",
            LoginError::UserResolutionFailed(_) => "user_resolution_failed",
            LoginError::JwksFetchFailed(_) => "jwks_fetch_failed",
            LoginError::JwksKeyNotFound(_) => "jwks_key_not_found",
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            LoginError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            LoginError::ProviderError { .. } => StatusCode::BAD_REQUEST,
            LoginError::MissingToken => StatusCode::BAD_REQUEST,
            LoginError::MalformedToken(_)
            | LoginError::InvalidIssuer
            | LoginError::InvalidAudience
            | LoginError::InvalidNonce
            | LoginError::MissingSubject
            | LoginError::MissingEmail
            | LoginError::EmailNotVerified
            | LoginError::TokenAlreadyExpired
            | LoginError::JwksKeyNotFound(_) => StatusCode::UNAUTHORIZED,
            LoginError::DuplicateIdentityMapping { .. } | LoginError::UserResolutionFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LoginError::JwksFetchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Error response body.
///
/// `login_url` points back to the manual login entry point so a failed
/// callback never strands the user.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub login_url: String,
}

/// Strip control characters and cap the length of provider-supplied text.
fn sanitize_provider_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_PROVIDER_MESSAGE_LEN)
        .collect()
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // ProviderError carries IdP-controlled text: sanitize before
            // rendering, log the raw values with Debug formatting only.
            LoginError::ProviderError { error, description } => {
                tracing::warn!(
                    idp_error = ?error,
                    idp_description = ?description,
                    "identity provider reported an error"
                );
                let raw = description.as_deref().unwrap_or(error);
                let sanitized = sanitize_provider_message(raw);
                if sanitized.is_empty() {
                    self.to_string()
                } else {
                    sanitized
                }
            }
            // Operator-facing faults: log the detail, keep the response generic.
            LoginError::DuplicateIdentityMapping { subject } => {
                tracing::error!(
                    subject = ?subject,
                    "data integrity fault: multiple users mapped to one provider subject"
                );
                "More than one user found with this user ID".to_string()
            }
            LoginError::UserResolutionFailed(detail) => {
                tracing::error!(detail = %detail, "user resolution failed");
                "Error finding or creating a user".to_string()
            }
            LoginError::JwksFetchFailed(detail) => {
                tracing::error!(detail = %detail, "JWKS fetch failed");
                "Failed to fetch identity provider keys".to_string()
            }
            LoginError::JwksKeyNotFound(kid) => {
                tracing::warn!(kid = ?kid, "JWKS signing key not found");
                "Signing key not found".to_string()
            }
            LoginError::MalformedToken(detail) => {
                tracing::warn!(detail = %detail, "malformed ID token");
                "Invalid ID token".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error: self.error_code().to_string(),
            message,
            login_url: LOGIN_PATH.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for login operations.
pub type LoginResult<T> = Result<T, LoginError>;
