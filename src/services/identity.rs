//! Identity resolution: mapping a validated token subject to a local user.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::{LoginError, LoginResult};
use crate::models::{LocalUser, NewLocalUser};

/// User store collaborator, provided by the host environment.
///
/// Only the call contract is specified here; the storage engine is the
/// host's concern. `find_by_subject` returns every match so the resolver can
/// detect duplicate mappings.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users whose external subject attribute equals `subject`.
    async fn find_by_subject(&self, subject: &str) -> LoginResult<Vec<LocalUser>>;

    /// The user owning `email`, if any.
    async fn find_by_email(&self, email: &str) -> LoginResult<Option<LocalUser>>;

    /// Create a user. One write.
    async fn create(&self, user: NewLocalUser) -> LoginResult<LocalUser>;

    /// Attach `subject` as the user's external subject attribute. One write.
    async fn attach_subject(&self, user_id: Uuid, subject: &str) -> LoginResult<LocalUser>;
}

/// Resolves a provider subject to a local user, creating one if absent.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
}

impl IdentityResolver {
    /// Create a resolver over the host's user store.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve `subject` to a local user.
    ///
    /// Exactly one subject match returns that user. Zero matches falls back
    /// to email: an existing account gets the subject attached (account
    /// linking), otherwise a new account is created carrying the subject and
    /// a random credential. More than one subject match is unrecoverable
    /// data corruption. At most one write happens per call.
    #[instrument(skip(self))]
    pub async fn resolve_or_create(&self, subject: &str, email: &str) -> LoginResult<LocalUser> {
        let matched = self.store.find_by_subject(subject).await?;

        if matched.len() > 1 {
            error!(
                subject = ?subject,
                count = matched.len(),
                "multiple users mapped to one provider subject"
            );
            return Err(LoginError::DuplicateIdentityMapping {
                subject: subject.to_string(),
            });
        }

        if let Some(user) = matched.into_iter().next() {
            info!(user_id = %user.id, "returning user resolved by subject");
            return Ok(user);
        }

        if let Some(user) = self.store.find_by_email(email).await? {
            info!(user_id = %user.id, "linking provider subject to existing user");
            return self.store.attach_subject(user.id, subject).await;
        }

        let user = self
            .store
            .create(NewLocalUser {
                email: email.to_string(),
                external_subject: subject.to_string(),
                credential: generate_credential(),
            })
            .await?;
        info!(user_id = %user.id, "created new user from provider identity");
        Ok(user)
    }
}

/// Random unguessable credential for accounts created by the resolver.
///
/// 32 bytes from the OS RNG; never transmitted and never usable for
/// interactive password login.
fn generate_credential() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
