//! Callback handlers receiving the provider's response.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::error::LoginError;
use crate::flow::CallbackRequest;
use crate::handlers::{cookie_map, render, AuthenticatedUser};
use crate::models::{CallbackForm, CallbackQuery};
use crate::router::LoginState;

/// POST /login/callback — the `form_post` response carrying the ID token.
#[instrument(skip_all)]
pub async fn callback_post(
    State(state): State<LoginState>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
    Form(form): Form<CallbackForm>,
) -> Response {
    let Some(flow) = state.flow() else {
        return LoginError::NotReady.into_response();
    };

    let request = CallbackRequest {
        authenticated: user.is_some(),
        cookies: cookie_map(&jar),
        id_token: form.id_token,
        error: form.error,
        error_description: form.error_description,
    };
    render(jar, flow.handle_callback(&request).await)
}

/// GET /login/callback — no token payload travels on GET; this arm exists
/// for provider error redirects and reports `MissingToken` otherwise.
#[instrument(skip_all)]
pub async fn callback_get(
    State(state): State<LoginState>,
    user: Option<Extension<AuthenticatedUser>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let Some(flow) = state.flow() else {
        return LoginError::NotReady.into_response();
    };

    let request = CallbackRequest {
        authenticated: user.is_some(),
        cookies: cookie_map(&jar),
        id_token: None,
        error: query.error,
        error_description: query.error_description,
    };
    render(jar, flow.handle_callback(&request).await)
}
