//! Login entry point and logout handlers.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::error::LoginError;
use crate::flow::LoginRequest;
use crate::handlers::{render, AuthenticatedUser};
use crate::models::LoginQuery;
use crate::router::LoginState;

/// GET /login — redirect an unauthenticated user to the identity provider.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<LoginState>,
    user: Option<Extension<AuthenticatedUser>>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    let Some(flow) = state.flow() else {
        return LoginError::NotReady.into_response();
    };

    let request = LoginRequest {
        authenticated: user.is_some(),
        action: query.action,
    };
    render(jar, flow.begin_login(&request))
}

/// GET /logout — redirect to the provider's logout endpoint.
#[instrument(skip_all)]
pub async fn logout(State(state): State<LoginState>, jar: CookieJar) -> Response {
    let Some(flow) = state.flow() else {
        return LoginError::NotReady.into_response();
    };

    render(jar, flow.logout())
}
