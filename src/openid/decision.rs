//! Authentication decision: turning a verified identity into granted roles.
//!
//! The interceptor submits an unauthenticated token; the decision-maker
//! answers with a new token carrying roles, or with an
//! [`AuthenticationError`]. Trust is only ever granted here, by constructing
//! a fresh token.

use async_trait::async_trait;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{debug, info};

use crate::openid::error::AuthenticationError;
use crate::openid::token::OpenIdToken;

/// Role granted to identities provisioned on first login.
pub const DEFAULT_PROVISIONED_ROLE: &str = "ROLE_USER";

/// Central authentication decision.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Decide whether `token`'s identity may log in.
    ///
    /// # Errors
    /// Returns the rejection to surface through the failure handler.
    async fn decide(&self, token: &OpenIdToken) -> Result<OpenIdToken, AuthenticationError>;
}

/// One known identity and what it is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    identity: String,
    roles: BTreeSet<String>,
    attributes: HashMap<String, String>,
}

impl IdentityRecord {
    #[must_use]
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
}

/// Lookup and first-login persistence for identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up a known identity.
    ///
    /// # Errors
    /// Returns an error when the backing store is unreachable.
    async fn find(&self, identity: &str) -> anyhow::Result<Option<IdentityRecord>>;

    /// Persist a first-login record.
    ///
    /// # Errors
    /// Returns an error when the backing store is unreachable.
    async fn provision(&self, record: IdentityRecord) -> anyhow::Result<()>;
}

/// Identity store held in process memory, for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<HashMap<String, IdentityRecord>>,
}

impl InMemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a known identity.
    pub fn insert(&self, record: IdentityRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.identity().to_string(), record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find(&self, identity: &str) -> anyhow::Result<Option<IdentityRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(identity).cloned())
    }

    async fn provision(&self, record: IdentityRecord) -> anyhow::Result<()> {
        self.insert(record);
        Ok(())
    }
}

/// Default decision-maker: grant the roles a backing [`IdentityStore`] knows
/// for the identity, optionally provisioning unknown identities on first
/// login from the provider-supplied attributes.
pub struct StoreBackedDecisionMaker {
    store: Arc<dyn IdentityStore>,
    provision_users: bool,
}

impl StoreBackedDecisionMaker {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            provision_users: false,
        }
    }

    /// Allow unknown identities to be provisioned on first login.
    #[must_use]
    pub fn with_provisioning(mut self, provision_users: bool) -> Self {
        self.provision_users = provision_users;
        self
    }
}

#[async_trait]
impl DecisionMaker for StoreBackedDecisionMaker {
    async fn decide(&self, token: &OpenIdToken) -> Result<OpenIdToken, AuthenticationError> {
        let identity = token.identity();
        let found = self.store.find(identity).await.map_err(|err| {
            AuthenticationError::Unavailable {
                reason: err.to_string(),
            }
        })?;

        let record = match found {
            Some(record) => {
                debug!(identity, "identity found");
                record
            }
            None if self.provision_users => {
                let record = IdentityRecord::new(identity, [DEFAULT_PROVISIONED_ROLE])
                    .with_attributes(token.attributes().clone());
                self.store.provision(record.clone()).await.map_err(|err| {
                    AuthenticationError::Unavailable {
                        reason: err.to_string(),
                    }
                })?;
                info!(identity, "provisioned identity on first login");
                record
            }
            None => {
                return Err(AuthenticationError::IdentityNotFound {
                    identity: identity.to_string(),
                });
            }
        };

        if record.roles().is_empty() {
            return Err(AuthenticationError::Rejected {
                reason: format!("identity {identity:?} has no granted roles"),
            });
        }

        // Provider attributes are fresher than stored ones and win.
        let mut attributes = record.attributes().clone();
        attributes.extend(
            token
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(OpenIdToken::new(record.identity(), record.roles().iter().cloned())
            .with_attributes(attributes))
    }
}
