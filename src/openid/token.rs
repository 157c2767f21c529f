//! The credential produced by a completed delegated login.
//!
//! An [`OpenIdToken`] is authenticated exactly when it was constructed with a
//! non-empty role set. There is no way to upgrade an existing token: the
//! decision-maker grants trust by building a new token with roles, never by
//! mutating the one it was handed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::openid::error::TrustEscalationError;

/// Role-bearing principal credential for a delegated login.
///
/// Serializes cleanly so it can round-trip through a persisted session. The
/// trust state is derived from the role set on every read, so a token cannot
/// be deserialized into a forged authenticated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdToken {
    identity: String,
    roles: BTreeSet<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

impl OpenIdToken {
    /// Build a token from an identity and granted roles.
    ///
    /// With an empty role set the token is unauthenticated; with any roles it
    /// is authenticated from birth.
    pub fn new<I, S>(identity: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity: identity.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            attributes: HashMap::new(),
        }
    }

    /// Build the pre-decision token: the identity was verified by the
    /// provider but no roles have been granted yet.
    pub fn unauthenticated(identity: impl Into<String>) -> Self {
        Self::new(identity, std::iter::empty::<String>())
    }

    /// Attach provider-supplied attribute exchange data.
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
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// There is no secret behind a delegated login; the trust anchor is the
    /// external verification.
    #[must_use]
    pub fn credentials(&self) -> &'static str {
        ""
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Guard rail kept from the mutable-token days.
    ///
    /// Marking a token trusted after construction is always rejected; marking
    /// it untrusted is accepted and does nothing, since trust is derived from
    /// the role set.
    pub fn mark_authenticated(&self, trusted: bool) -> Result<(), TrustEscalationError> {
        if trusted {
            return Err(TrustEscalationError);
        }
        Ok(())
    }
}
