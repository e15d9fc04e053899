//! The login flow state machine.
//!
//! `Anonymous → Redirected → Validating → SessionEstablished`, with `Failed`
//! terminal from `Redirected` and `Validating`. Each transition consumes an
//! explicit request context and returns a [`FlowResponse`] carrying the
//! outcome plus the cookie effects to apply — the machine itself performs no
//! HTTP or cookie I/O, so it is fully testable without a request pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use crate::config::LoginConfig;
use crate::error::LoginError;
use crate::models::Session;
use crate::nonce::{CookieOp, NonceStore};
use crate::services::{
    AuthorizeUrlBuilder, IdTokenValidator, IdentityResolver, SessionPolicy, SessionSink, UserStore,
};

/// Actions on the login entry point that bypass the provider redirect and
/// let the host's own page proceed.
pub const PASS_THROUGH_ACTIONS: &[&str] = &["logout", "unlock"];

/// Request context for the login entry point.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    /// Whether the request already carries an authenticated session.
    pub authenticated: bool,
    /// The requested action, if any.
    pub action: Option<String>,
}

/// Request context for the callback endpoint.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    pub authenticated: bool,
    /// Incoming cookies (the client-bound nonce store).
    pub cookies: HashMap<String, String>,
    /// Posted ID token, if any.
    pub id_token: Option<String>,
    /// Provider-reported error code.
    pub error: Option<String>,
    /// Provider-reported error description.
    pub error_description: Option<String>,
}

/// Outcome of a flow transition.
#[derive(Debug)]
pub enum FlowOutcome {
    /// Recognized pass-through action; the host page proceeds.
    PassThrough,
    /// Redirect the browser.
    Redirect(String),
    /// Session established; redirect to `redirect_to`.
    SessionEstablished {
        session: Session,
        redirect_to: String,
    },
    /// Terminal failure for this request.
    Failed(LoginError),
}

/// A flow transition result: the outcome plus cookie effects to apply.
///
/// Cookie effects are meaningful on failures too — the nonce clear emitted
/// during validation must reach the client even when validation fails.
#[derive(Debug)]
pub struct FlowResponse {
    pub outcome: FlowOutcome,
    pub cookies: Vec<CookieOp>,
}

impl FlowResponse {
    fn pass_through() -> Self {
        Self {
            outcome: FlowOutcome::PassThrough,
            cookies: Vec::new(),
        }
    }

    fn redirect(url: String) -> Self {
        Self {
            outcome: FlowOutcome::Redirect(url),
            cookies: Vec::new(),
        }
    }

    fn failed(error: LoginError, cookies: Vec<CookieOp>) -> Self {
        Self {
            outcome: FlowOutcome::Failed(error),
            cookies,
        }
    }
}

/// Orchestrates the login protocol states.
pub struct LoginFlow {
    config: LoginConfig,
    nonces: NonceStore,
    authorize: AuthorizeUrlBuilder,
    validator: IdTokenValidator,
    identity: IdentityResolver,
    sessions: Arc<dyn SessionSink>,
    policy: Arc<dyn SessionPolicy>,
}

impl LoginFlow {
    /// Assemble the flow from a complete configuration and the host
    /// collaborators.
    #[must_use]
    pub fn new(
        config: LoginConfig,
        store: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionSink>,
        policy: Arc<dyn SessionPolicy>,
    ) -> Self {
        Self {
            nonces: NonceStore::default(),
            authorize: AuthorizeUrlBuilder::new(config.clone()),
            validator: IdTokenValidator::new(config.clone()),
            identity: IdentityResolver::new(store),
            sessions,
            policy,
            config,
        }
    }

    /// `Anonymous` entry: issue a nonce and redirect to the provider.
    ///
    /// Pass-through actions and already-authenticated requests short-circuit
    /// without issuing a nonce — repeated entry while authenticated always
    /// redirects home and never starts a new attempt.
    #[instrument(skip(self))]
    pub fn begin_login(&self, request: &LoginRequest) -> FlowResponse {
        if let Some(action) = request.action.as_deref() {
            if PASS_THROUGH_ACTIONS.contains(&action) {
                return FlowResponse::pass_through();
            }
        }

        if request.authenticated {
            return FlowResponse::redirect(self.config.home_url());
        }

        let mut cookies = Vec::new();
        let attempt = self
            .nonces
            .issue(self.config.secure_transport(), &mut cookies);

        match self.authorize.build(&attempt.nonce) {
            Ok(url) => {
                info!("redirecting to identity provider");
                FlowResponse {
                    outcome: FlowOutcome::Redirect(url),
                    cookies,
                }
            }
            Err(error) => FlowResponse::failed(error, cookies),
        }
    }

    /// `Redirected → Validating → SessionEstablished` on callback receipt.
    ///
    /// Any gate failure is terminal for this request; the collected cookie
    /// effects are returned either way.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, request: &CallbackRequest) -> FlowResponse {
        let mut cookies = Vec::new();

        // Provider-reported errors terminate before any token processing.
        if request.error.is_some() || request.error_description.is_some() {
            let error = request.error.clone().unwrap_or_default();
            warn!(error = ?error, "provider reported an error on callback");
            return FlowResponse::failed(
                LoginError::ProviderError {
                    error,
                    description: request.error_description.clone(),
                },
                cookies,
            );
        }

        if request.authenticated {
            return FlowResponse::redirect(self.config.home_url());
        }

        let Some(raw_token) = request.id_token.as_deref().filter(|t| !t.is_empty()) else {
            return FlowResponse::failed(LoginError::MissingToken, cookies);
        };

        let token = match self
            .validator
            .validate(raw_token, &request.cookies, &self.nonces, &mut cookies)
            .await
        {
            Ok(token) => token,
            Err(error) => return FlowResponse::failed(error, cookies),
        };

        let user = match self
            .identity
            .resolve_or_create(&token.subject, &token.email)
            .await
        {
            Ok(user) => user,
            Err(error) => return FlowResponse::failed(error, cookies),
        };

        // Session lifetime is bound to the token's remaining lifetime. A
        // non-positive remainder means clock skew exceeded the token
        // lifetime; no session may exist for it.
        let now = Utc::now();
        let token_lifetime = token.expires_at - now;
        if token_lifetime <= Duration::zero() {
            return FlowResponse::failed(LoginError::TokenAlreadyExpired, cookies);
        }

        let expires_at = now + self.policy.session_lifetime(token_lifetime);
        let secure = self.policy.secure_cookie(self.config.secure_transport());

        if let Err(error) = self.sessions.establish(user.id, expires_at, secure).await {
            return FlowResponse::failed(error, cookies);
        }

        info!(user_id = %user.id, expires_at = %expires_at, "session established");
        FlowResponse {
            outcome: FlowOutcome::SessionEstablished {
                session: Session {
                    user_id: user.id,
                    expires_at,
                },
                redirect_to: self.config.home_url(),
            },
            cookies,
        }
    }

    /// Unconditional logout transition: redirect to the provider logout
    /// endpoint, returning to the local home.
    #[instrument(skip(self))]
    pub fn logout(&self) -> FlowResponse {
        match self.authorize.logout_url() {
            Ok(url) => FlowResponse::redirect(url),
            Err(error) => FlowResponse::failed(error, Vec::new()),
        }
    }
}
