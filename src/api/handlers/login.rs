//! Login page: a minimal form posting the claimed identifier to the check
//! path, plus one-shot rendering of any pending authentication error.

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::{Html, IntoResponse},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use super::presented_session_token;
use crate::api::state::AppState;
use crate::openid::session::AUTH_ERROR_SESSION_KEY;

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login form, with any pending authentication error rendered once", content_type = "text/html", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // The error is removed as it is read; reloading the page shows it once.
    let error = presented_session_token(&headers)
        .and_then(|token| state.sessions().resolve(&token))
        .and_then(|session| session.remove(AUTH_ERROR_SESSION_KEY))
        .and_then(|value| value.as_str().map(str::to_string));

    if let Some(message) = &error {
        debug!(message, "rendering a pending authentication error");
    }

    let mut form = String::new();
    if let Some(message) = &error {
        form.push_str(&format!(
            "<p class=\"error\">{}</p>\n",
            escape_html(message)
        ));
    }
    form.push_str(&format!(
        "<form method=\"post\" action=\"{}\">\n",
        escape_html(state.config().check_path())
    ));
    form.push_str(
        "<label>OpenID identifier \
         <input type=\"text\" name=\"openid_identifier\" autofocus></label>\n",
    );
    for alias in state.config().required_attributes().keys() {
        form.push_str(&format!(
            "<label>{alias} <input type=\"text\" name=\"ax_{alias}\"></label>\n",
            alias = escape_html(alias)
        ));
    }
    if let Some(return_to) = query.get("return_to") {
        form.push_str(&format!(
            "<input type=\"hidden\" name=\"return_to\" value=\"{}\">\n",
            escape_html(return_to)
        ));
    }
    form.push_str("<button type=\"submit\">Sign in</button>\n</form>");

    Html(format!(
        "<!doctype html>\n<html>\n<head><title>Sign in</title></head>\n\
         <body>\n<h1>Sign in</h1>\n{form}\n</body>\n</html>"
    ))
}
