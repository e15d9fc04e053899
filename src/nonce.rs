//! Anti-replay nonce issuance and single-use consumption.
//!
//! The nonce lives in a client-bound cookie, so concurrent logins from
//! different browsers never contend. This module never touches the HTTP
//! layer directly: it reads an incoming cookie map and emits [`CookieOp`]
//! effects for the boundary to apply.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;

/// Name of the nonce cookie.
pub const NONCE_COOKIE: &str = "id_token_nonce";

/// Nonce lifetime. An attempt older than this can no longer complete.
pub const NONCE_TTL_SECS: i64 = 3600;

/// Nonce entropy in bytes (256 bits).
const NONCE_BYTES: usize = 32;

/// A cookie side effect for the HTTP boundary to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieOp {
    Set {
        name: &'static str,
        value: String,
        max_age_secs: i64,
        secure: bool,
    },
    Clear {
        name: &'static str,
    },
}

/// An in-flight login attempt, owned by one browser session.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

/// Issues and consumes login nonces.
#[derive(Debug, Clone, Default)]
pub struct NonceStore;

impl NonceStore {
    /// Issue a fresh nonce and emit the cookie `Set` effect.
    ///
    /// Must be called before the authorize redirect is returned so the
    /// cookie travels with it.
    pub fn issue(&self, secure: bool, effects: &mut Vec<CookieOp>) -> LoginAttempt {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let nonce = URL_SAFE_NO_PAD.encode(bytes);

        effects.push(CookieOp::Set {
            name: NONCE_COOKIE,
            value: nonce.clone(),
            max_age_secs: NONCE_TTL_SECS,
            secure,
        });

        LoginAttempt {
            nonce,
            created_at: Utc::now(),
        }
    }

    /// Read the stored nonce, clear it, and compare it with the presented
    /// value.
    ///
    /// The `Clear` effect is emitted before anything else: a nonce is usable
    /// for exactly one callback, whatever that callback's outcome. The
    /// presented value is percent-decoded before comparison. Returns `false`
    /// when no stored nonce exists, it cannot be decoded, or it mismatches.
    pub fn consume_and_compare(
        &self,
        cookies: &HashMap<String, String>,
        presented: Option<&str>,
        effects: &mut Vec<CookieOp>,
    ) -> bool {
        effects.push(CookieOp::Clear { name: NONCE_COOKIE });

        let Some(stored) = cookies.get(NONCE_COOKIE).filter(|v| !v.is_empty()) else {
            return false;
        };
        let Some(presented) = presented else {
            return false;
        };
        let Ok(decoded) = urlencoding::decode(presented) else {
            return false;
        };
        decoded.as_ref() == stored.as_str()
    }
}
