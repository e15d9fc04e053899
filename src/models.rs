//! Data models for the login flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an incoming ID token.
///
/// Every gated claim is optional at the deserialization layer so the
/// validator — not serde — decides which specific failure a missing or
/// malformed claim produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience. Providers return a string or an array of strings.
    #[serde(default)]
    pub aud: Option<StringOrArray>,
    /// Subject (user id at the provider).
    #[serde(default)]
    pub sub: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the provider verified the email address.
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Nonce bound to the login attempt.
    #[serde(default)]
    pub nonce: Option<String>,
    /// Expiration time (seconds since the epoch).
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued-at time (seconds since the epoch).
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Handles `aud` being either a single string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrArray {
    /// Check whether the audience contains a specific value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrArray::Single(s) => s == value,
            StringOrArray::Multiple(v) => v.iter().any(|s| s == value),
        }
    }
}

/// Outcome of a fully validated ID token.
///
/// Only produced by the validator once every gate has passed, so the fields
/// the rest of the flow depends on are no longer optional.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// Provider subject, present and non-empty.
    pub subject: String,
    /// Verified email address, present and non-empty.
    pub email: String,
    /// Token expiration; session lifetime is bound to it.
    pub expires_at: DateTime<Utc>,
}

/// A local user account.
#[derive(Debug, Clone)]
pub struct LocalUser {
    pub id: Uuid,
    pub email: String,
    /// Provider subject attached to this account, if any. Unique across
    /// users: more than one account sharing a subject is a data-integrity
    /// fault, not a recoverable state.
    pub external_subject: Option<String>,
}

/// Input for creating a local user during identity resolution.
#[derive(Debug, Clone)]
pub struct NewLocalUser {
    pub email: String,
    pub external_subject: String,
    /// Random unguessable credential. Never transmitted and never usable for
    /// interactive password login; it only exists so the store's account
    /// record is complete.
    pub credential: String,
}

/// An established authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    /// Exactly `token.exp - now` from the validated ID token (subject only
    /// to the injected session policy).
    pub expires_at: DateTime<Utc>,
}

/// Query parameters accepted by the login entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginQuery {
    /// Recognized pass-through actions skip the provider redirect.
    pub action: Option<String>,
}

/// Query parameters accepted by the callback endpoint (GET).
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Form fields posted to the callback endpoint (`form_post` response mode).
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackForm {
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_single_and_array_forms() {
        let single: StringOrArray = serde_json::from_str(r#""client-abc""#).unwrap();
        assert!(single.contains("client-abc"));
        assert!(!single.contains("other"));

        let multiple: StringOrArray =
            serde_json::from_str(r#"["client-abc", "another-client"]"#).unwrap();
        assert!(multiple.contains("client-abc"));
        assert!(multiple.contains("another-client"));
        assert!(!multiple.contains("missing"));
    }

    #[test]
    fn claims_tolerate_missing_fields() {
        let claims: IdTokenClaims = serde_json::from_str("{}").unwrap();
        assert!(claims.iss.is_none());
        assert!(claims.sub.is_none());
        assert!(claims.exp.is_none());
    }

    #[test]
    fn claims_deserialize_fully() {
        let json = r#"{
            "iss": "https://myapp.example-idp.com/",
            "aud": "client-abc",
            "sub": "auth0|12345",
            "email": "user@example.com",
            "email_verified": true,
            "nonce": "abc123",
            "exp": 1700003600,
            "iat": 1700000000
        }"#;
        let claims: IdTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("auth0|12345"));
        assert_eq!(claims.email_verified, Some(true));
        assert!(claims.aud.unwrap().contains("client-abc"));
    }
}
