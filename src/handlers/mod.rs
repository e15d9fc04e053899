//! HTTP boundary: axum handlers for the login flow.

mod callback;
mod login;

pub use callback::{callback_get, callback_post};
pub use login::{login, logout};

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::flow::{FlowOutcome, FlowResponse};
use crate::nonce::CookieOp;

/// Identity of an already-authenticated user, inserted as a request
/// extension by the host's own auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

/// Snapshot the incoming cookies for the flow's request context.
pub(crate) fn cookie_map(jar: &CookieJar) -> HashMap<String, String> {
    jar.iter()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

/// Apply the flow's cookie effects to the response jar.
fn apply_cookies(mut jar: CookieJar, ops: Vec<CookieOp>) -> CookieJar {
    for op in ops {
        match op {
            CookieOp::Set {
                name,
                value,
                max_age_secs,
                secure,
            } => {
                // SameSite must be None: the provider delivers the callback
                // as a cross-site form POST, and the nonce cookie has to
                // travel with it.
                let cookie = Cookie::build((name, value))
                    .path("/")
                    .http_only(true)
                    .secure(secure)
                    .same_site(SameSite::None)
                    .max_age(time::Duration::seconds(max_age_secs))
                    .build();
                jar = jar.add(cookie);
            }
            CookieOp::Clear { name } => {
                jar = jar.remove(Cookie::build(name).path("/").build());
            }
        }
    }
    jar
}

/// Render a flow response, applying its cookie effects.
pub(crate) fn render(jar: CookieJar, response: FlowResponse) -> Response {
    let jar = apply_cookies(jar, response.cookies);
    match response.outcome {
        FlowOutcome::PassThrough => (jar, StatusCode::NO_CONTENT).into_response(),
        FlowOutcome::Redirect(url) => (jar, Redirect::temporary(&url)).into_response(),
        FlowOutcome::SessionEstablished { redirect_to, .. } => {
            (jar, Redirect::temporary(&redirect_to)).into_response()
        }
        FlowOutcome::Failed(error) => (jar, error).into_response(),
    }
}
