//! The relying party boundary.
//!
//! The actual handshake with an identity provider (discovery, association,
//! signature checking) lives behind [`RelyingParty`]. The interceptor only
//! cares about the two legal outcomes: send the client somewhere, or assert a
//! verified identity.

use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::openid::{error::RelyingPartyError, request::ExchangeRequest};

/// Outcome of a completed identity-provider round trip.
///
/// `identity` must be non-empty for the result to count as verified; the
/// interceptor rejects empty identities as a protocol breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderResult {
    identity: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

impl IdentityProviderResult {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            attributes: HashMap::new(),
        }
    }

    /// Attach attribute exchange data returned by the provider.
    #[must_use]
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        !self.identity.is_empty()
    }
}

/// Client-facing redirect, installed verbatim as the interceptor response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// Build a `302 Found` redirect to the given location.
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: StatusCode::FOUND,
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        (self.status, [(header::LOCATION, self.location)]).into_response()
    }
}

/// The two legal results of delegating a check-path request.
///
/// Anything else a relying party wants to express has to be an error, which
/// the interceptor escalates as a protocol breach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelyingPartyOutcome {
    /// Send the client off to the identity provider and wait for the round
    /// trip to come back.
    Redirect(Redirect),
    /// The provider asserted this identity; proceed to the decision.
    Verified(IdentityProviderResult),
}

/// Driver for the external identity-provider handshake.
///
/// Implementations may perform network I/O in `manage` and may read or write
/// the session through the request's session handle, but must never mutate
/// the request value itself.
#[async_trait]
pub trait RelyingParty: Send + Sync {
    /// Pure applicability predicate. Must be side-effect free so the
    /// interceptor can call it speculatively; returning `false` lets other
    /// mechanisms sharing the check path have a go.
    fn supports(&self, request: &ExchangeRequest) -> bool;

    /// Run one leg of the verification round trip.
    async fn manage(
        &self,
        request: &ExchangeRequest,
    ) -> Result<RelyingPartyOutcome, RelyingPartyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_becomes_a_found_response() {
        let response = Redirect::to("http://idp.example/verify").into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok()),
            Some("http://idp.example/verify")
        );
    }

    #[test]
    fn empty_identity_is_not_verified() {
        assert!(!IdentityProviderResult::new("").is_verified());
        assert!(IdentityProviderResult::new("https://idp.example/alice").is_verified());
    }

    #[test]
    fn attributes_default_to_empty() {
        let result = IdentityProviderResult::new("https://idp.example/alice");
        assert!(result.attributes().is_empty());

        let with_attrs = result.with_attributes(HashMap::from([(
            "email".to_string(),
            "a@x.com".to_string(),
        )]));
        assert_eq!(
            with_attrs.attributes().get("email").map(String::as_str),
            Some("a@x.com")
        );
    }
}
