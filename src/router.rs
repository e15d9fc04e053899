//! Router and shared state for the login endpoints.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tracing::warn;

use crate::config::Settings;
use crate::flow::LoginFlow;
use crate::services::{SessionPolicy, SessionSink, UserStore};

/// Manual login entry point.
pub const LOGIN_PATH: &str = "/login";
/// Fixed callback endpoint registered with the provider.
pub const CALLBACK_PATH: &str = "/login/callback";
/// Logout entry point.
pub const LOGOUT_PATH: &str = "/logout";

/// Shared state for the login handlers.
///
/// Holds the assembled flow only when the configuration is complete; until
/// then every endpoint answers `not_ready`.
#[derive(Clone)]
pub struct LoginState {
    flow: Option<Arc<LoginFlow>>,
}

impl LoginState {
    /// Build the state from settings and the host collaborators.
    #[must_use]
    pub fn new(
        settings: &Settings,
        store: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionSink>,
        policy: Arc<dyn SessionPolicy>,
    ) -> Self {
        let flow = settings
            .ready()
            .map(|config| Arc::new(LoginFlow::new(config, store, sessions, policy)));
        if flow.is_none() {
            warn!("login configuration incomplete; login endpoints answer not_ready");
        }
        Self { flow }
    }

    /// The assembled flow, if configured.
    #[must_use]
    pub fn flow(&self) -> Option<Arc<LoginFlow>> {
        self.flow.clone()
    }

    /// Whether the login flow can start at all.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.flow.is_some()
    }
}

/// Create the login router.
///
/// Mount at the application root: the callback path must match the
/// `redirect_uri` registered with the provider.
pub fn login_router() -> Router<LoginState> {
    Router::new()
        .route(LOGIN_PATH, get(crate::handlers::login))
        .route(
            CALLBACK_PATH,
            get(crate::handlers::callback_get).post(crate::handlers::callback_post),
        )
        .route(LOGOUT_PATH, get(crate::handlers::logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoginResult;
    use crate::models::{LocalUser, NewLocalUser};
    use crate::services::DefaultSessionPolicy;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    struct NullStore;

    #[async_trait]
    impl UserStore for NullStore {
        async fn find_by_subject(&self, _subject: &str) -> LoginResult<Vec<LocalUser>> {
            Ok(Vec::new())
        }
        async fn find_by_email(&self, _email: &str) -> LoginResult<Option<LocalUser>> {
            Ok(None)
        }
        async fn create(&self, _user: NewLocalUser) -> LoginResult<LocalUser> {
            Err(crate::error::LoginError::UserResolutionFailed(
                "unused".to_string(),
            ))
        }
        async fn attach_subject(&self, _user_id: Uuid, _subject: &str) -> LoginResult<LocalUser> {
            Err(crate::error::LoginError::UserResolutionFailed(
                "unused".to_string(),
            ))
        }
    }

    struct NullSink;

    #[async_trait]
    impl SessionSink for NullSink {
        async fn establish(
            &self,
            _user_id: Uuid,
            _expires_at: DateTime<Utc>,
            _secure: bool,
        ) -> LoginResult<()> {
            Ok(())
        }
    }

    fn state(settings: &Settings) -> LoginState {
        LoginState::new(
            settings,
            Arc::new(NullStore),
            Arc::new(NullSink),
            Arc::new(DefaultSessionPolicy),
        )
    }

    #[test]
    fn incomplete_settings_yield_not_ready_state() {
        let settings = Settings {
            tenant_domain: None,
            client_id: Some("client-abc".to_string()),
            base_url: "https://app.example.com".to_string(),
        };
        assert!(!state(&settings).is_ready());
    }

    #[test]
    fn complete_settings_yield_ready_state() {
        let settings = Settings {
            tenant_domain: Some("myapp.example-idp.com".to_string()),
            client_id: Some("client-abc".to_string()),
            base_url: "https://app.example.com".to_string(),
        };
        assert!(state(&settings).is_ready());
    }

    #[test]
    fn router_is_created() {
        let _router = login_router();
    }
}
