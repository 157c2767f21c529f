//! Server-side sessions and the post-login fixation strategy.
//!
//! Sessions are bound to a random cookie token; the store only ever keys by
//! the SHA-256 of that token, so raw cookie values never sit in memory longer
//! than a request. A successful login migrates the session to a fresh token
//! while keeping its data, which is what defeats session fixation.

use anyhow::{Context, Result};
use axum::http::{HeaderValue, header::InvalidHeaderValue};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};
use tracing::debug;

use crate::openid::request::ExchangeRequest;

pub const SESSION_COOKIE_NAME: &str = "delegi_session";

/// Serialized authenticated token, written by the security context.
pub const PRINCIPAL_SESSION_KEY: &str = "_delegi.principal";

/// Pending authentication error, written by the failure handler and consumed
/// (once) by the login page.
pub const AUTH_ERROR_SESSION_KEY: &str = "_delegi.authentication_error";

/// Post-login destination captured before the provider round trip.
pub const RETURN_TO_SESSION_KEY: &str = "_delegi.return_to";

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the store keys by hash.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values are never used for lookups.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build a secure `HttpOnly` cookie for the session token.
///
/// # Errors
/// Returns an error if the token contains bytes illegal in a header value.
pub fn session_cookie(
    token: &str,
    max_age_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Cookie that expires the session on the client.
///
/// # Errors
/// Never fails in practice; kept fallible to mirror [`session_cookie`].
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub type SessionHandle = Arc<Session>;

#[derive(Debug)]
struct SessionInner {
    key_hash: Vec<u8>,
    data: HashMap<String, Value>,
    issued_token: Option<String>,
    touched: Instant,
}

/// One server-side session. Cheap to share; all access goes through short
/// lock-guarded sections.
#[derive(Debug)]
pub struct Session {
    inner: RwLock<SessionInner>,
}

impl Session {
    fn new(key_hash: Vec<u8>, issued_token: String) -> Self {
        Self {
            inner: RwLock::new(SessionInner {
                key_hash,
                data: HashMap::new(),
                issued_token: Some(issued_token),
                touched: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.data.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.data.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.data.remove(key)
    }

    /// Cookie token waiting to be sent to the client, set when the session is
    /// created or migrated. Whoever writes the response drains it.
    pub fn take_issued_token(&self) -> Option<String> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.issued_token.take()
    }

    fn key_hash(&self) -> Vec<u8> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.key_hash.clone()
    }

    fn rekey(&self, key_hash: Vec<u8>, issued_token: String) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.key_hash = key_hash;
        inner.issued_token = Some(issued_token);
        inner.touched = Instant::now();
    }

    fn expired(&self, ttl: Duration) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.touched.elapsed() > ttl
    }

    fn touch(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.touched = Instant::now();
    }
}

/// In-memory session store with an idle TTL.
///
/// Lock order is always store map first, then session inner; keep it that way
/// when extending this type.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Vec<u8>, SessionHandle>>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a fresh session. The cookie token is stashed on the session for
    /// the response writer to drain.
    ///
    /// # Errors
    /// Returns an error if session entropy cannot be sourced.
    pub fn create(&self) -> Result<SessionHandle> {
        let token = generate_session_token()?;
        let key_hash = hash_session_token(&token);
        let handle = Arc::new(Session::new(key_hash.clone(), token));

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(key_hash, Arc::clone(&handle));
        Ok(handle)
    }

    /// Resolve a presented cookie token to a live session, refreshing its
    /// idle timer. Expired entries are dropped on the way out.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<SessionHandle> {
        let key_hash = hash_session_token(token);
        let handle = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions.get(&key_hash).map(Arc::clone)
        }?;

        if handle.expired(self.ttl) {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.remove(&key_hash);
            return None;
        }

        handle.touch();
        Some(handle)
    }

    /// Re-key a session under a fresh cookie token, keeping its data. The old
    /// token stops resolving immediately.
    ///
    /// # Errors
    /// Returns an error if session entropy cannot be sourced.
    pub fn migrate(&self, session: &SessionHandle) -> Result<()> {
        let token = generate_session_token()?;
        let key_hash = hash_session_token(&token);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&session.key_hash());
        session.rekey(key_hash.clone(), token);
        sessions.insert(key_hash, Arc::clone(session));
        Ok(())
    }

    /// Drop a session server-side. The caller clears the cookie.
    pub fn destroy(&self, session: &SessionHandle) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&session.key_hash());
    }

    /// Sweep idle-expired sessions; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.expired(self.ttl));
        before - sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Post-login session rotation hook.
///
/// Only invoked when the request has, or previously had, a session. Whole
/// thing is optional on the interceptor for stateless deployments.
pub trait SessionAuthenticationStrategy: Send + Sync {
    /// Called once after a successful authentication decision.
    ///
    /// # Errors
    /// A failure here is escalated as fatal by the caller.
    fn on_authentication(&self, request: &ExchangeRequest) -> Result<()>;
}

/// Default strategy: migrate the session to a fresh cookie token.
pub struct MigrateSessionStrategy {
    store: Arc<SessionStore>,
}

impl MigrateSessionStrategy {
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl SessionAuthenticationStrategy for MigrateSessionStrategy {
    fn on_authentication(&self, request: &ExchangeRequest) -> Result<()> {
        let Some(session) = request.session() else {
            // Previous session existed but is gone; nothing to rotate.
            return Ok(());
        };
        self.store.migrate(session)?;
        debug!("session migrated after login");
        Ok(())
    }
}
