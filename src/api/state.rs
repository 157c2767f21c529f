//! Service configuration and shared state.

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::openid::{
    DEFAULT_CHECK_PATH, IdentityStore, InterceptorOptions, LoginRedirectFailureHandler,
    MigrateSessionStrategy, OpenIdInterceptor, RedirectSuccessHandler, RelyingParty,
    SessionSecurityContext, SessionStore, StoreBackedDecisionMaker,
    handlers::{DEFAULT_LOGIN_PATH, DEFAULT_TARGET_PATH},
};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    base_url: String,
    check_path: String,
    login_path: String,
    target_path: String,
    session_ttl_seconds: u64,
    required_attributes: HashMap<String, String>,
    optional_attributes: HashMap<String, String>,
    provision_users: bool,
    stateless: bool,
}

impl ServiceConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            check_path: DEFAULT_CHECK_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            target_path: DEFAULT_TARGET_PATH.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            required_attributes: HashMap::new(),
            optional_attributes: HashMap::new(),
            provision_users: false,
            stateless: false,
        }
    }

    #[must_use]
    pub fn with_check_path(mut self, check_path: String) -> Self {
        self.check_path = check_path;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: String) -> Self {
        self.login_path = login_path;
        self
    }

    #[must_use]
    pub fn with_target_path(mut self, target_path: String) -> Self {
        self.target_path = target_path;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_required_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.required_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_optional_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.optional_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_provisioning(mut self, provision_users: bool) -> Self {
        self.provision_users = provision_users;
        self
    }

    #[must_use]
    pub fn with_stateless(mut self, stateless: bool) -> Self {
        self.stateless = stateless;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn check_path(&self) -> &str {
        &self.check_path
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn required_attributes(&self) -> &HashMap<String, String> {
        &self.required_attributes
    }

    #[must_use]
    pub fn optional_attributes(&self) -> &HashMap<String, String> {
        &self.optional_attributes
    }

    #[must_use]
    pub fn provision_users(&self) -> bool {
        self.provision_users
    }

    #[must_use]
    pub fn stateless(&self) -> bool {
        self.stateless
    }

    /// Only mark cookies secure when the service is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Everything the handlers share: configuration, the session store, and the
/// wired interceptor.
pub struct AppState {
    config: ServiceConfig,
    sessions: Arc<SessionStore>,
    interceptor: Arc<OpenIdInterceptor>,
}

impl AppState {
    /// Wire the default collaborators around `config`.
    ///
    /// The relying party stays optional on purpose; a check-path request
    /// without one surfaces the wiring fault instead of being swallowed.
    #[must_use]
    pub fn from_config(
        config: ServiceConfig,
        identities: Arc<dyn IdentityStore>,
        relying_party: Option<Arc<dyn RelyingParty>>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(
            config.session_ttl_seconds(),
        )));
        let secure = config.session_cookie_secure();

        let success = RedirectSuccessHandler::new(config.target_path())
            .with_cookie(config.session_ttl_seconds(), secure);
        let failure = LoginRedirectFailureHandler::new(config.login_path())
            .with_cookie(config.session_ttl_seconds(), secure);
        let decision =
            StoreBackedDecisionMaker::new(identities).with_provisioning(config.provision_users());
        let options = InterceptorOptions::new()
            .with_check_path(config.check_path())
            .with_required_attributes(config.required_attributes().clone())
            .with_optional_attributes(config.optional_attributes().clone());

        let mut interceptor = OpenIdInterceptor::new(
            options,
            Arc::new(SessionSecurityContext::new()),
            Arc::new(decision),
            Arc::new(success),
            Arc::new(failure),
        );
        if !config.stateless() {
            interceptor = interceptor
                .with_session_strategy(Arc::new(MigrateSessionStrategy::new(Arc::clone(&sessions))));
        }
        if let Some(relying_party) = relying_party {
            interceptor = interceptor.with_relying_party(relying_party);
        }

        Self {
            config,
            sessions,
            interceptor: Arc::new(interceptor),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn interceptor(&self) -> &OpenIdInterceptor {
        &self.interceptor
    }
}
