//! ID token validation.
//!
//! Validates an incoming ID token in a fixed, externally observable order:
//! signature/structure, issuer, audience, nonce, subject, email,
//! email-verified. The first failing gate wins, so a token violating several
//! claims always produces the same failure kind. Nonce consumption happens
//! exactly once per callback attempt, whatever the outcome.

use std::collections::HashMap;

use chrono::DateTime;
use jsonwebtoken::{decode, decode_header, Validation};
use tracing::{debug, instrument, warn};

use crate::config::LoginConfig;
use crate::error::{LoginError, LoginResult};
use crate::models::{IdTokenClaims, ValidatedToken};
use crate::nonce::{CookieOp, NonceStore};
use crate::services::jwks_cache::JwksCache;

/// Validates incoming ID tokens against the configured tenant.
#[derive(Clone)]
pub struct IdTokenValidator {
    config: LoginConfig,
    jwks: JwksCache,
}

impl IdTokenValidator {
    /// Create a validator for the given configuration.
    #[must_use]
    pub fn new(config: LoginConfig) -> Self {
        Self {
            config,
            jwks: JwksCache::default(),
        }
    }

    /// Create a validator with a custom JWKS cache.
    #[must_use]
    pub fn with_cache(config: LoginConfig, jwks: JwksCache) -> Self {
        Self { config, jwks }
    }

    /// Run the full validation pipeline on a raw token string.
    ///
    /// Consumes the stored nonce via `nonces` (the clear effect lands in
    /// `effects` as soon as the nonce gate is reached, regardless of its
    /// outcome) and returns the validated claim set.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        raw_token: &str,
        cookies: &HashMap<String, String>,
        nonces: &NonceStore,
        effects: &mut Vec<CookieOp>,
    ) -> LoginResult<ValidatedToken> {
        let claims = self.decode_and_verify(raw_token).await?;
        self.check_claims(&claims, cookies, nonces, effects)
    }

    /// Gate 1: structure and signature.
    ///
    /// Issuer, audience, and expiry checks are disabled here on purpose —
    /// the ordered claim gates own them so each failure kind is
    /// deterministic. A token without an `exp` claim is structurally
    /// invalid.
    async fn decode_and_verify(&self, raw_token: &str) -> LoginResult<IdTokenClaims> {
        let header = decode_header(raw_token)
            .map_err(|e| LoginError::MalformedToken(format!("failed to decode header: {e}")))?;

        let jwk = self
            .jwks
            .find_signing_key(&self.config.jwks_uri(), header.kid.as_deref())
            .await?;
        let (key, algorithm) = jwk.decoding_key()?;

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<IdTokenClaims>(raw_token, &key, &validation).map_err(|e| {
            warn!(error = %e, "ID token signature validation failed");
            LoginError::MalformedToken(format!("signature validation failed: {e}"))
        })?;

        let claims = data.claims;
        if claims.exp.is_none() {
            return Err(LoginError::MalformedToken(
                "token has no exp claim".to_string(),
            ));
        }

        debug!(issuer = ?claims.iss, "ID token signature verified");
        Ok(claims)
    }

    /// Gates 2-7, in order: issuer, audience, nonce, subject, email,
    /// email-verified.
    fn check_claims(
        &self,
        claims: &IdTokenClaims,
        cookies: &HashMap<String, String>,
        nonces: &NonceStore,
        effects: &mut Vec<CookieOp>,
    ) -> LoginResult<ValidatedToken> {
        if claims.iss.as_deref() != Some(self.config.issuer().as_str()) {
            warn!(issuer = ?claims.iss, "ID token issuer mismatch");
            return Err(LoginError::InvalidIssuer);
        }

        let audience_ok = claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(self.config.client_id()));
        if !audience_ok {
            warn!("ID token audience mismatch");
            return Err(LoginError::InvalidAudience);
        }

        if !nonces.consume_and_compare(cookies, claims.nonce.as_deref(), effects) {
            warn!("ID token nonce mismatch or missing");
            return Err(LoginError::InvalidNonce);
        }

        let subject = claims
            .sub
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(LoginError::MissingSubject)?;

        let email = claims
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(LoginError::MissingEmail)?;

        if claims.email_verified != Some(true) {
            return Err(LoginError::EmailNotVerified);
        }

        let exp = claims
            .exp
            .ok_or_else(|| LoginError::MalformedToken("token has no exp claim".to_string()))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| LoginError::MalformedToken("exp out of range".to_string()))?;

        Ok(ValidatedToken {
            subject: subject.to_string(),
            email: email.to_string(),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::StringOrArray;
    use crate::nonce::NONCE_COOKIE;
    use chrono::Utc;

    fn validator() -> IdTokenValidator {
        let settings = Settings {
            tenant_domain: Some("myapp.example-idp.com".to_string()),
            client_id: Some("client-abc".to_string()),
            base_url: "https://app.example.com".to_string(),
        };
        IdTokenValidator::new(settings.ready().unwrap())
    }

    fn good_claims() -> IdTokenClaims {
        IdTokenClaims {
            iss: Some("https://myapp.example-idp.com/".to_string()),
            aud: Some(StringOrArray::Single("client-abc".to_string())),
            sub: Some("auth0|12345".to_string()),
            email: Some("user@example.com".to_string()),
            email_verified: Some(true),
            nonce: Some("abc123".to_string()),
            exp: Some(Utc::now().timestamp() + 3600),
            iat: Some(Utc::now().timestamp()),
        }
    }

    fn nonce_cookies() -> HashMap<String, String> {
        HashMap::from([(NONCE_COOKIE.to_string(), "abc123".to_string())])
    }

    fn check(claims: &IdTokenClaims) -> LoginResult<ValidatedToken> {
        let mut effects = Vec::new();
        validator().check_claims(claims, &nonce_cookies(), &NonceStore::default(), &mut effects)
    }

    #[test]
    fn valid_claims_pass_all_gates() {
        let token = check(&good_claims()).unwrap();
        assert_eq!(token.subject, "auth0|12345");
        assert_eq!(token.email, "user@example.com");
    }

    #[test]
    fn issuer_mismatch() {
        let mut claims = good_claims();
        claims.iss = Some("https://evil.example.com/".to_string());
        assert!(matches!(check(&claims), Err(LoginError::InvalidIssuer)));

        claims.iss = None;
        assert!(matches!(check(&claims), Err(LoginError::InvalidIssuer)));

        // Trailing slash matters: the issuer must match exactly.
        claims.iss = Some("https://myapp.example-idp.com".to_string());
        assert!(matches!(check(&claims), Err(LoginError::InvalidIssuer)));
    }

    #[test]
    fn audience_mismatch() {
        let mut claims = good_claims();
        claims.aud = Some(StringOrArray::Single("other-client".to_string()));
        assert!(matches!(check(&claims), Err(LoginError::InvalidAudience)));

        claims.aud = None;
        assert!(matches!(check(&claims), Err(LoginError::InvalidAudience)));
    }

    #[test]
    fn audience_array_containing_client_passes() {
        let mut claims = good_claims();
        claims.aud = Some(StringOrArray::Multiple(vec![
            "client-abc".to_string(),
            "another".to_string(),
        ]));
        assert!(check(&claims).is_ok());
    }

    #[test]
    fn nonce_mismatch() {
        let mut claims = good_claims();
        claims.nonce = Some("xyz999".to_string());
        assert!(matches!(check(&claims), Err(LoginError::InvalidNonce)));

        claims.nonce = None;
        assert!(matches!(check(&claims), Err(LoginError::InvalidNonce)));
    }

    #[test]
    fn nonce_gate_clears_cookie_even_on_mismatch() {
        let mut claims = good_claims();
        claims.nonce = Some("xyz999".to_string());
        let mut effects = Vec::new();
        let result = validator().check_claims(
            &claims,
            &nonce_cookies(),
            &NonceStore::default(),
            &mut effects,
        );
        assert!(matches!(result, Err(LoginError::InvalidNonce)));
        assert_eq!(effects, vec![CookieOp::Clear { name: NONCE_COOKIE }]);
    }

    #[test]
    fn missing_subject() {
        let mut claims = good_claims();
        claims.sub = None;
        assert!(matches!(check(&claims), Err(LoginError::MissingSubject)));

        claims.sub = Some(String::new());
        assert!(matches!(check(&claims), Err(LoginError::MissingSubject)));
    }

    #[test]
    fn missing_email() {
        let mut claims = good_claims();
        claims.email = None;
        assert!(matches!(check(&claims), Err(LoginError::MissingEmail)));
    }

    #[test]
    fn unverified_email() {
        let mut claims = good_claims();
        claims.email_verified = Some(false);
        assert!(matches!(check(&claims), Err(LoginError::EmailNotVerified)));

        claims.email_verified = None;
        assert!(matches!(check(&claims), Err(LoginError::EmailNotVerified)));
    }

    #[test]
    fn gate_order_is_fixed_under_multiple_violations() {
        // Bad issuer AND bad nonce: the issuer gate fires first.
        let mut claims = good_claims();
        claims.iss = Some("https://evil.example.com/".to_string());
        claims.nonce = Some("xyz999".to_string());
        assert!(matches!(check(&claims), Err(LoginError::InvalidIssuer)));

        // Bad audience AND missing subject: audience first.
        let mut claims = good_claims();
        claims.aud = None;
        claims.sub = None;
        assert!(matches!(check(&claims), Err(LoginError::InvalidAudience)));

        // Bad nonce AND missing email: nonce first (and the cookie is
        // consumed before the failure is reported).
        let mut claims = good_claims();
        claims.nonce = None;
        claims.email = None;
        assert!(matches!(check(&claims), Err(LoginError::InvalidNonce)));
    }

    #[test]
    fn failure_before_nonce_gate_leaves_cookie() {
        // Gates before the nonce gate leave the stored nonce untouched; the
        // cookie TTL is then the only thing that retires the attempt.
        let mut claims = good_claims();
        claims.iss = None;
        let mut effects = Vec::new();
        let _ = validator().check_claims(
            &claims,
            &nonce_cookies(),
            &NonceStore::default(),
            &mut effects,
        );
        assert!(effects.is_empty());
    }
}
