//! Logout: drop the server-side session and expire the cookie.

use axum::{
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use super::presented_session_token;
use crate::api::state::AppState;
use crate::openid::Redirect;
use crate::openid::session::clear_session_cookie;

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 302, description = "Session cleared, redirecting to the login page")
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = presented_session_token(&headers)
        && let Some(session) = state.sessions().resolve(&token)
    {
        state.sessions().destroy(&session);
        debug!("session destroyed on logout");
    }

    // Always expire the cookie, even when no live session matched.
    let mut response = Redirect::to(state.config().login_path()).into_response();
    if let Ok(cookie) = clear_session_cookie(state.config().session_cookie_secure()) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
