//! Session establishment collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::LoginResult;

/// Session collaborator, provided by the host environment.
///
/// Called exactly once per successful callback, after full validation.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Establish an authenticated session for `user_id` expiring at
    /// `expires_at`.
    async fn establish(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        secure: bool,
    ) -> LoginResult<()>;
}

/// Injected policy for session establishment.
///
/// The defaults implement the core invariants: session lifetime is exactly
/// the remaining token lifetime, and the secure flag follows the transport.
/// Hosts override a method to deviate deliberately.
pub trait SessionPolicy: Send + Sync {
    /// Session lifetime, given the remaining ID token lifetime.
    fn session_lifetime(&self, token_lifetime: Duration) -> Duration {
        token_lifetime
    }

    /// Whether the session cookie must carry the secure flag.
    fn secure_cookie(&self, transport_is_secure: bool) -> bool {
        transport_is_secure
    }
}

/// The default policy: token-bound lifetime, transport-bound secure flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSessionPolicy;

impl SessionPolicy for DefaultSessionPolicy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_identity() {
        let policy = DefaultSessionPolicy;
        let lifetime = Duration::seconds(1234);
        assert_eq!(policy.session_lifetime(lifetime), lifetime);
        assert!(policy.secure_cookie(true));
        assert!(!policy.secure_cookie(false));
    }

    #[test]
    fn overriding_policy_changes_lifetime() {
        struct CappedPolicy;
        impl SessionPolicy for CappedPolicy {
            fn session_lifetime(&self, token_lifetime: Duration) -> Duration {
                token_lifetime.min(Duration::seconds(600))
            }
            fn secure_cookie(&self, _transport_is_secure: bool) -> bool {
                true
            }
        }

        let policy = CappedPolicy;
        assert_eq!(
            policy.session_lifetime(Duration::seconds(3600)),
            Duration::seconds(600)
        );
        assert!(policy.secure_cookie(false));
    }
}
