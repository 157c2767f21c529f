//! Response production after the authentication decision.
//!
//! Handlers get the original request, never the relying party's duplicate,
//! and own the full response: where to send the client and which session
//! cookie to set. A handler failing is fatal to the exchange.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::openid::error::AuthenticationFailure;
use crate::openid::relying_party::Redirect;
use crate::openid::request::ExchangeRequest;
use crate::openid::session::{AUTH_ERROR_SESSION_KEY, RETURN_TO_SESSION_KEY, session_cookie};
use crate::openid::token::OpenIdToken;

pub const DEFAULT_TARGET_PATH: &str = "/";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_COOKIE_MAX_AGE: u64 = 3600;

/// Writes the response for a completed login.
#[async_trait]
pub trait AuthenticationSuccessHandler: Send + Sync {
    /// Produce the response for `request` after `token` was installed.
    ///
    /// # Errors
    /// A failure here is escalated as fatal by the caller.
    async fn on_success(&self, request: &ExchangeRequest, token: &OpenIdToken) -> Result<Response>;
}

/// Writes the response for a rejected login.
#[async_trait]
pub trait AuthenticationFailureHandler: Send + Sync {
    /// Produce the response for `request` after the decision rejected
    /// `failure.token()`.
    ///
    /// # Errors
    /// A failure here is escalated as fatal by the caller.
    async fn on_failure(
        &self,
        request: &ExchangeRequest,
        failure: &AuthenticationFailure,
    ) -> Result<Response>;
}

/// Reject anything that could leave the site: only relative paths with a
/// single leading slash survive.
#[must_use]
pub fn sanitize_return_to(target: &str) -> Option<&str> {
    if target.starts_with('/') && !target.starts_with("//") && !target.contains('\\') {
        Some(target)
    } else {
        None
    }
}

fn redirect_with_session_cookie(
    request: &ExchangeRequest,
    location: &str,
    cookie_max_age: u64,
    cookie_secure: bool,
) -> Result<Response> {
    let mut response = Redirect::to(location).into_response();
    if let Some(session) = request.session()
        && let Some(token) = session.take_issued_token()
    {
        let cookie = session_cookie(&token, cookie_max_age, cookie_secure)
            .context("failed to build the session cookie")?;
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

/// Default success handler: honor a session-stored return-to target when it
/// is safe, else redirect to the configured target path.
pub struct RedirectSuccessHandler {
    target_path: String,
    cookie_max_age: u64,
    cookie_secure: bool,
}

impl RedirectSuccessHandler {
    #[must_use]
    pub fn new(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            cookie_max_age: DEFAULT_COOKIE_MAX_AGE,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, max_age_seconds: u64, secure: bool) -> Self {
        self.cookie_max_age = max_age_seconds;
        self.cookie_secure = secure;
        self
    }
}

#[async_trait]
impl AuthenticationSuccessHandler for RedirectSuccessHandler {
    async fn on_success(&self, request: &ExchangeRequest, token: &OpenIdToken) -> Result<Response> {
        let return_to = request.session().and_then(|session| {
            let stored = session.remove(RETURN_TO_SESSION_KEY)?;
            let target = stored.as_str()?.to_string();
            sanitize_return_to(&target).map(str::to_string)
        });
        let destination = return_to.as_deref().unwrap_or(&self.target_path);

        debug!(
            identity = token.identity(),
            destination, "redirecting after login"
        );
        redirect_with_session_cookie(request, destination, self.cookie_max_age, self.cookie_secure)
    }
}

/// Default failure handler: park the rejection in the session and send the
/// client back to the login page, which renders it once.
pub struct LoginRedirectFailureHandler {
    login_path: String,
    cookie_max_age: u64,
    cookie_secure: bool,
}

impl LoginRedirectFailureHandler {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            cookie_max_age: DEFAULT_COOKIE_MAX_AGE,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, max_age_seconds: u64, secure: bool) -> Self {
        self.cookie_max_age = max_age_seconds;
        self.cookie_secure = secure;
        self
    }
}

#[async_trait]
impl AuthenticationFailureHandler for LoginRedirectFailureHandler {
    async fn on_failure(
        &self,
        request: &ExchangeRequest,
        failure: &AuthenticationFailure,
    ) -> Result<Response> {
        if let Some(session) = request.session() {
            session.insert(AUTH_ERROR_SESSION_KEY, json!(failure.error().to_string()));
        }

        debug!(
            identity = failure.token().identity(),
            login_path = self.login_path.as_str(),
            "redirecting to the login page after a rejected login"
        );
        redirect_with_session_cookie(
            request,
            &self.login_path,
            self.cookie_max_age,
            self.cookie_secure,
        )
    }
}
