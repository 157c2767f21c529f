//! Development relying party that skips the real provider round trip.
//!
//! The outbound leg answers with a redirect straight back to the check path,
//! carrying the derived identity and echoes of any attribute-exchange values
//! posted with the login form. The return leg turns those parameters into a
//! verified result. Useful for driving the whole login flow locally without
//! an identity provider; never wired unless explicitly asked for.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::openid::error::RelyingPartyError;
use crate::openid::relying_party::{
    IdentityProviderResult, Redirect, RelyingParty, RelyingPartyOutcome,
};
use crate::openid::request::ExchangeRequest;

/// Login-form parameter carrying the claimed identifier, as in the OpenID
/// simple-registration forms this mimics.
pub const IDENTIFIER_PARAM: &str = "openid_identifier";

/// Marker parameter on the simulated provider return leg.
pub const LOOPBACK_PARAM: &str = "loopback_identity";

const AX_PARAM_PREFIX: &str = "ax_";

pub struct LoopbackRelyingParty {
    check_path: String,
}

impl LoopbackRelyingParty {
    #[must_use]
    pub fn new(check_path: impl Into<String>) -> Self {
        Self {
            check_path: check_path.into(),
        }
    }
}

/// Reduce a claimed identifier to a local account name: last path segment of
/// a URL identifier, its host when the path is bare, the trimmed string
/// otherwise.
fn derive_identity(claimed: &str) -> String {
    let Ok(url) = Url::parse(claimed) else {
        return claimed.trim().to_string();
    };
    url.path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).next_back())
        .or_else(|| url.host_str())
        .map_or_else(|| claimed.trim().to_string(), str::to_string)
}

#[async_trait]
impl RelyingParty for LoopbackRelyingParty {
    fn supports(&self, request: &ExchangeRequest) -> bool {
        request.param(IDENTIFIER_PARAM).is_some() || request.param(LOOPBACK_PARAM).is_some()
    }

    async fn manage(
        &self,
        request: &ExchangeRequest,
    ) -> Result<RelyingPartyOutcome, RelyingPartyError> {
        // Return leg: the "provider" sent the client back with a verified
        // identity and the requested attributes.
        if let Some(identity) = request.param(LOOPBACK_PARAM) {
            let mut attributes = HashMap::new();
            if let Some(policy) = request.ax_policy() {
                for alias in policy.aliases() {
                    if let Some(value) = request.param(&format!("{AX_PARAM_PREFIX}{alias}")) {
                        attributes.insert(alias.to_string(), value.to_string());
                    }
                }
            }
            debug!(identity, "loopback return leg verified");
            return Ok(RelyingPartyOutcome::Verified(
                IdentityProviderResult::new(identity).with_attributes(attributes),
            ));
        }

        // Outbound leg: bounce the client straight back to the check path,
        // the way a real provider would redirect after authenticating.
        let Some(claimed) = request.param(IDENTIFIER_PARAM) else {
            return Err(RelyingPartyError::new(
                "loopback request carries neither an identifier nor a verified identity",
            ));
        };

        let identity = derive_identity(claimed);
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair(LOOPBACK_PARAM, &identity);
        if let Some(policy) = request.ax_policy() {
            for alias in policy.aliases() {
                let param = format!("{AX_PARAM_PREFIX}{alias}");
                if let Some(value) = request.param(&param) {
                    query.append_pair(&param, value);
                }
            }
        }

        let location = format!("{}?{}", self.check_path, query.finish());
        debug!(identity, "loopback outbound leg redirecting");
        Ok(RelyingPartyOutcome::Redirect(Redirect::to(location)))
    }
}
