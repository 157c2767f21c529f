//! Error taxonomy for the delegated authentication flow.
//!
//! Two families with very different handling:
//!
//! - [`InterceptError`] is fatal. Missing wiring and collaborator contract
//!   breaches are deployment defects; the service surfaces them loudly and
//!   never retries.
//! - [`AuthenticationError`] is an expected runtime outcome. It is wrapped in
//!   an [`AuthenticationFailure`] together with the token that attempted the
//!   login and routed to the failure handler.

use thiserror::Error;

use crate::openid::token::OpenIdToken;

/// Fatal fault while driving the interception state machine.
///
/// None of these variants are recoverable at request time; they indicate a
/// wiring defect or a collaborator breaking its contract.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error(
        "a relying party is required for the check path to work, but none was set; \
         this is a wiring defect"
    )]
    RelyingPartyNotSet,

    #[error("relying party must produce a redirect or a verified identity result: {reason}")]
    RelyingPartyContract { reason: String },

    #[error("authentication decision returned a token without granted roles for {identity:?}")]
    UntrustedDecision { identity: String },

    #[error("could not install the authenticated principal: {0}")]
    SecurityContext(anyhow::Error),

    #[error("session strategy failed after authentication: {0}")]
    SessionStrategy(anyhow::Error),

    #[error("success handler failed: {0}")]
    SuccessHandler(anyhow::Error),

    #[error("failure handler failed: {0}")]
    FailureHandler(anyhow::Error),
}

/// Expected rejection from the authentication decision-maker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("unknown identity {identity:?}")]
    IdentityNotFound { identity: String },

    #[error("authentication rejected: {reason}")]
    Rejected { reason: String },

    #[error("authentication decision unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A rejected login, annotated with the unauthenticated token that attempted
/// it so failure handlers can tell which external identity failed.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct AuthenticationFailure {
    error: AuthenticationError,
    token: OpenIdToken,
}

impl AuthenticationFailure {
    #[must_use]
    pub fn new(error: AuthenticationError, token: OpenIdToken) -> Self {
        Self { error, token }
    }

    #[must_use]
    pub fn error(&self) -> &AuthenticationError {
        &self.error
    }

    #[must_use]
    pub fn token(&self) -> &OpenIdToken {
        &self.token
    }
}

/// Failure inside a relying party round trip.
///
/// The interceptor treats any of these as a protocol breach, never as a
/// recoverable authentication failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RelyingPartyError {
    message: String,
}

impl RelyingPartyError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rejected attempt to flip a token to trusted after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot mark a token trusted after construction")]
pub struct TrustEscalationError;
