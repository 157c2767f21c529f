//! The intercepted check path.
//!
//! Mounted outside the documented router because its path is deployment
//! configuration. Both GET and POST land here: GET for the provider's return
//! leg, POST for the login form.

use axum::{
    extract::{Extension, RawForm},
    http::{HeaderMap, Method, StatusCode, Uri, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::presented_session_token;
use crate::api::state::AppState;
use crate::openid::ExchangeRequest;
use crate::openid::session::{RETURN_TO_SESSION_KEY, session_cookie};

const RETURN_TO_PARAM: &str = "return_to";

pub async fn check(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Response {
    let presented = presented_session_token(&headers);
    let resolved = presented
        .as_deref()
        .and_then(|token| state.sessions().resolve(token));

    // The flow needs a session before the provider round trip: the fixation
    // strategy rotates it and the failure handler parks the error in it.
    let session = match resolved {
        Some(session) => session,
        None => match state.sessions().create() {
            Ok(session) => session,
            Err(err) => {
                error!("failed to open a session for the check path: {err:#}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "authentication backend unavailable",
                )
                    .into_response();
            }
        },
    };

    let mut request = ExchangeRequest::new(method, uri, headers)
        .with_form_params(url::form_urlencoded::parse(&body).into_owned())
        .with_session(Arc::clone(&session));
    if presented.is_some() {
        request = request.with_previous_session();
    }

    // Raw here; the success handler sanitizes at consumption time.
    if let Some(target) = request.param(RETURN_TO_PARAM) {
        session.insert(RETURN_TO_SESSION_KEY, json!(target));
    }

    match state.interceptor().handle(&request).await {
        Ok(Some(mut response)) => {
            // A fresh session must reach the client on the provider redirect
            // leg too, or the round trip comes back without state.
            if let Some(token) = session.take_issued_token()
                && let Ok(cookie) = session_cookie(
                    &token,
                    state.config().session_ttl_seconds(),
                    state.config().session_cookie_secure(),
                )
            {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            "delegated authentication is not configured for this path",
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "authentication interception failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "authentication failed in an unrecoverable way",
            )
                .into_response()
        }
    }
}
