use crate::{
    api::{self, AppState, ServiceConfig},
    openid::{IdentityStore, InMemoryIdentityStore, LoopbackRelyingParty, RelyingParty},
};
use anyhow::Result;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub base_url: String,
    pub check_path: String,
    pub login_path: String,
    pub target_path: String,
    pub session_ttl_seconds: u64,
    pub required_attributes: HashMap<String, String>,
    pub optional_attributes: HashMap<String, String>,
    pub provision_users: bool,
    pub stateless: bool,
    pub loopback: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = ServiceConfig::new(args.base_url)
        .with_check_path(args.check_path)
        .with_login_path(args.login_path)
        .with_target_path(args.target_path)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_required_attributes(args.required_attributes)
        .with_optional_attributes(args.optional_attributes)
        .with_provisioning(args.provision_users)
        .with_stateless(args.stateless);

    debug!("Service config: {:?}", config);

    let identities: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());

    let relying_party: Option<Arc<dyn RelyingParty>> = if args.loopback {
        Some(Arc::new(LoopbackRelyingParty::new(config.check_path())))
    } else {
        warn!(
            "No relying party wired; requests to {} will fail",
            config.check_path()
        );
        None
    };

    let state = AppState::from_config(config, identities, relying_party);

    api::new(args.port, state).await
}
