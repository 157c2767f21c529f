//! API handlers and shared utilities for delegi.
//!
//! This module organizes the service's route handlers and provides the common
//! session-token extraction used by every endpoint that reads the cookie.

pub mod health;
pub mod login;
pub mod login_check;
pub mod logout;
pub mod root;
pub mod session;

use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::openid::session::SESSION_COOKIE_NAME;

/// Pull the session token a client presented, preferring a bearer header
/// over the cookie so API clients can skip the cookie jar.
pub(crate) fn presented_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        if let Some((key, val)) = pair.trim().split_once('=')
            && key.trim() == SESSION_COOKIE_NAME
        {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_tokens_are_extracted_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; delegi_session=tok123; lang=en"),
        );
        assert_eq!(presented_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn malformed_cookie_segments_do_not_hide_the_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("consent; ; delegi_session=tok123"),
        );
        assert_eq!(presented_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn bearer_tokens_win_over_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("delegi_session=tok123"),
        );
        assert_eq!(presented_session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn empty_bearer_values_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(presented_session_token(&headers).is_none());
    }

    #[test]
    fn unrelated_headers_yield_nothing() {
        assert!(presented_session_token(&HeaderMap::new()).is_none());
    }
}
