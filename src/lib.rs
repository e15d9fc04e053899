//! Relying-party OIDC login for axum.
//!
//! This crate implements the relying-party half of an OpenID Connect
//! implicit/form-post login flow: it redirects unauthenticated users to an
//! identity provider, validates the ID token posted back to the callback
//! endpoint, resolves the token subject to a local user (creating or linking
//! one as needed), and establishes a session whose lifetime is bound to the
//! token's expiry.
//!
//! # Design
//!
//! - **Explicit configuration**: a [`Settings`] struct with a single
//!   readiness predicate gates every entry point; the flow is inert until
//!   the tenant domain and client id are both present.
//! - **Explicit effects**: the flow consumes request-context values and
//!   returns outcomes plus cookie effects, so the state machine unit-tests
//!   without a live request pipeline.
//! - **Host collaborators as traits**: user storage ([`UserStore`]) and
//!   session establishment ([`SessionSink`], [`SessionPolicy`]) are
//!   host-provided; this crate specifies only the call contracts.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relier::{login_router, DefaultSessionPolicy, LoginState, Settings};
//!
//! let state = LoginState::new(
//!     &Settings::from_env(),
//!     Arc::new(my_user_store),
//!     Arc::new(my_session_sink),
//!     Arc::new(DefaultSessionPolicy),
//! );
//! let app = login_router().with_state(state);
//! ```

pub mod config;
pub mod error;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod nonce;
pub mod router;
pub mod services;

pub use config::{LoginConfig, Settings};
pub use error::{LoginError, LoginResult};
pub use flow::{CallbackRequest, FlowOutcome, FlowResponse, LoginFlow, LoginRequest};
pub use handlers::AuthenticatedUser;
pub use models::{IdTokenClaims, LocalUser, NewLocalUser, Session, ValidatedToken};
pub use nonce::{CookieOp, NonceStore, NONCE_COOKIE};
pub use router::{login_router, LoginState, CALLBACK_PATH, LOGIN_PATH, LOGOUT_PATH};
pub use services::{
    DefaultSessionPolicy, IdentityResolver, SessionPolicy, SessionSink, UserStore,
};
