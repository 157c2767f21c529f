//! Security context: where the trusted principal is installed.
//!
//! The interceptor never reads the principal back; it only installs it after
//! a successful decision. Reading happens at the service edge, which goes
//! straight to the session.

use anyhow::{Context, Result, bail};

use crate::openid::request::ExchangeRequest;
use crate::openid::session::{PRINCIPAL_SESSION_KEY, SessionHandle};
use crate::openid::token::OpenIdToken;

/// Holder of the currently trusted principal for one exchange.
///
/// Installation failures are fatal to the exchange; implementations must not
/// silently drop a token.
pub trait SecurityContext: Send + Sync {
    /// Install `token` as the active principal for this exchange.
    ///
    /// # Errors
    /// Returns an error if the principal cannot be stored.
    fn set_principal(&self, request: &ExchangeRequest, token: &OpenIdToken) -> Result<()>;
}

/// Default context: the principal lives in the server-side session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionSecurityContext;

impl SessionSecurityContext {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SecurityContext for SessionSecurityContext {
    fn set_principal(&self, request: &ExchangeRequest, token: &OpenIdToken) -> Result<()> {
        let Some(session) = request.session() else {
            bail!("request has no session to hold the authenticated principal");
        };
        let value =
            serde_json::to_value(token).context("failed to serialize the authenticated token")?;
        session.insert(PRINCIPAL_SESSION_KEY, value);
        Ok(())
    }
}

/// Read the installed principal back out of a session.
///
/// Unreadable or missing values mean "not authenticated"; a stale shape in a
/// long-lived session is not an error worth failing the request over.
#[must_use]
pub fn principal_from_session(session: &SessionHandle) -> Option<OpenIdToken> {
    let value = session.get(PRINCIPAL_SESSION_KEY)?;
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openid::session::SessionStore;
    use anyhow::Result;
    use axum::http::{HeaderMap, Method};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn principal_round_trips_through_the_session() -> Result<()> {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create()?;
        let request = ExchangeRequest::new(Method::GET, "/login_check_openid".parse()?, HeaderMap::new())
            .with_session(Arc::clone(&session));

        let token = OpenIdToken::new("alice", ["ROLE_USER"]);
        SessionSecurityContext::new().set_principal(&request, &token)?;

        let installed = principal_from_session(&session).expect("principal installed");
        assert_eq!(installed, token);
        Ok(())
    }

    #[test]
    fn installing_without_a_session_fails() -> Result<()> {
        let request =
            ExchangeRequest::new(Method::GET, "/login_check_openid".parse()?, HeaderMap::new());
        let token = OpenIdToken::new("alice", ["ROLE_USER"]);

        let err = SessionSecurityContext::new()
            .set_principal(&request, &token)
            .expect_err("no session to write to");
        assert!(err.to_string().contains("no session"));
        Ok(())
    }

    #[test]
    fn unreadable_session_values_read_as_unauthenticated() -> Result<()> {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create()?;
        session.insert(PRINCIPAL_SESSION_KEY, json!("not a token"));

        assert!(principal_from_session(&session).is_none());
        Ok(())
    }
}
