//! The authentication interception state machine.
//!
//! One [`OpenIdInterceptor`] instance is shared by every exchange. It watches
//! a single configured check path and walks each matching request through:
//! path match, relying-party applicability, delegation, decision, and finally
//! the success or failure handler. Requests that do not concern it pass
//! through with zero side effects.

use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::openid::context::SecurityContext;
use crate::openid::decision::DecisionMaker;
use crate::openid::error::{AuthenticationFailure, InterceptError};
use crate::openid::handlers::{AuthenticationFailureHandler, AuthenticationSuccessHandler};
use crate::openid::relying_party::{RelyingParty, RelyingPartyOutcome};
use crate::openid::request::{AxPolicy, ExchangeRequest};
use crate::openid::session::SessionAuthenticationStrategy;
use crate::openid::token::OpenIdToken;

pub const DEFAULT_CHECK_PATH: &str = "/login_check_openid";

/// Interception configuration: which path to watch and which attribute
/// exchange to request from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorOptions {
    check_path: String,
    required_attributes: HashMap<String, String>,
    optional_attributes: HashMap<String, String>,
}

impl InterceptorOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            check_path: DEFAULT_CHECK_PATH.to_string(),
            required_attributes: HashMap::new(),
            optional_attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_check_path(mut self, check_path: impl Into<String>) -> Self {
        self.check_path = check_path.into();
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
    pub fn check_path(&self) -> &str {
        &self.check_path
    }

    #[must_use]
    pub fn required_attributes(&self) -> &HashMap<String, String> {
        &self.required_attributes
    }

    #[must_use]
    pub fn optional_attributes(&self) -> &HashMap<String, String> {
        &self.optional_attributes
    }

    /// Annotation installed on the duplicate handed to the relying party.
    #[must_use]
    pub fn ax_policy(&self) -> AxPolicy {
        AxPolicy::new(
            self.required_attributes.clone(),
            self.optional_attributes.clone(),
        )
    }
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives delegated authentication for requests hitting the check path.
///
/// Collaborators are injected at construction and shared across exchanges;
/// all of them must tolerate concurrent calls. The relying party is the only
/// optional one with teeth: a matching request without one is a wiring
/// defect, not a pass-through.
pub struct OpenIdInterceptor {
    options: InterceptorOptions,
    relying_party: Option<Arc<dyn RelyingParty>>,
    security_context: Arc<dyn SecurityContext>,
    decision_maker: Arc<dyn DecisionMaker>,
    session_strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    success_handler: Arc<dyn AuthenticationSuccessHandler>,
    failure_handler: Arc<dyn AuthenticationFailureHandler>,
}

impl OpenIdInterceptor {
    #[must_use]
    pub fn new(
        options: InterceptorOptions,
        security_context: Arc<dyn SecurityContext>,
        decision_maker: Arc<dyn DecisionMaker>,
        success_handler: Arc<dyn AuthenticationSuccessHandler>,
        failure_handler: Arc<dyn AuthenticationFailureHandler>,
    ) -> Self {
        Self {
            options,
            relying_party: None,
            security_context,
            decision_maker,
            session_strategy: None,
            success_handler,
            failure_handler,
        }
    }

    #[must_use]
    pub fn with_relying_party(mut self, relying_party: Arc<dyn RelyingParty>) -> Self {
        self.relying_party = Some(relying_party);
        self
    }

    /// Install the post-login session rotation. Stateless deployments leave
    /// this unset.
    #[must_use]
    pub fn with_session_strategy(
        mut self,
        strategy: Arc<dyn SessionAuthenticationStrategy>,
    ) -> Self {
        self.session_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn check_path(&self) -> &str {
        self.options.check_path()
    }

    /// Run one exchange through the state machine.
    ///
    /// `Ok(None)` means the request is not ours: the path did not match, or
    /// the relying party does not recognize the mechanism. `Ok(Some(_))` is
    /// the produced response, either the provider redirect or whatever the
    /// success/failure handler wrote. `Err(_)` is a fatal wiring or protocol
    /// fault for the edge to surface loudly.
    ///
    /// The relying party only ever sees a duplicate of `request`, annotated
    /// with the configured attribute exchange; handlers get the original.
    ///
    /// # Errors
    /// Returns an [`InterceptError`] on missing wiring, a relying party
    /// breaking its contract, a trust-escalating decision, or a failing
    /// collaborator.
    pub async fn handle(
        &self,
        request: &ExchangeRequest,
    ) -> Result<Option<Response>, InterceptError> {
        if !request.matches_path(self.options.check_path()) {
            return Ok(None);
        }
        debug!(path = request.path(), "check path matched");

        let Some(relying_party) = self.relying_party.as_ref() else {
            error!("no relying party wired for the check path");
            return Err(InterceptError::RelyingPartyNotSet);
        };

        if !relying_party.supports(request) {
            debug!("request does not carry this mechanism, passing through");
            return Ok(None);
        }

        let delegated = request.duplicate().with_ax_policy(self.options.ax_policy());
        let outcome = relying_party.manage(&delegated).await.map_err(|err| {
            error!(error = %err, "relying party round trip failed");
            InterceptError::RelyingPartyContract {
                reason: err.to_string(),
            }
        })?;

        let verified = match outcome {
            RelyingPartyOutcome::Redirect(redirect) => {
                debug!(
                    location = redirect.location(),
                    "delegating to the identity provider"
                );
                return Ok(Some(redirect.into_response()));
            }
            RelyingPartyOutcome::Verified(result) => result,
        };

        if !verified.is_verified() {
            error!("relying party asserted a verified result with an empty identity");
            return Err(InterceptError::RelyingPartyContract {
                reason: "verified result carries an empty identity".to_string(),
            });
        }

        let attempt = OpenIdToken::unauthenticated(verified.identity())
            .with_attributes(verified.attributes().clone());
        debug!(identity = attempt.identity(), "identity verified, deciding");

        match self.decision_maker.decide(&attempt).await {
            Ok(authenticated) => self
                .complete_success(request, authenticated)
                .await
                .map(Some),
            Err(error) => {
                warn!(identity = attempt.identity(), error = %error, "authentication failed");
                let failure = AuthenticationFailure::new(error, attempt);
                let response = self
                    .failure_handler
                    .on_failure(request, &failure)
                    .await
                    .map_err(InterceptError::FailureHandler)?;
                Ok(Some(response))
            }
        }
    }

    async fn complete_success(
        &self,
        request: &ExchangeRequest,
        token: OpenIdToken,
    ) -> Result<Response, InterceptError> {
        if !token.is_authenticated() {
            error!(
                identity = token.identity(),
                "decision success without granted roles"
            );
            return Err(InterceptError::UntrustedDecision {
                identity: token.identity().to_string(),
            });
        }

        self.security_context
            .set_principal(request, &token)
            .map_err(InterceptError::SecurityContext)?;

        if let Some(strategy) = self.session_strategy.as_ref()
            && (request.has_session() || request.has_previous_session())
        {
            strategy
                .on_authentication(request)
                .map_err(InterceptError::SessionStrategy)?;
        }

        info!(identity = token.identity(), "login completed");

        self.success_handler
            .on_success(request, &token)
            .await
            .map_err(InterceptError::SuccessHandler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openid::error::{AuthenticationError, RelyingPartyError};
    use crate::openid::relying_party::{IdentityProviderResult, Redirect};
    use crate::openid::session::SessionStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, StatusCode, header};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedRelyingParty {
        supports: bool,
        outcome: Mutex<Option<Result<RelyingPartyOutcome, RelyingPartyError>>>,
        seen: Mutex<Option<ExchangeRequest>>,
    }

    impl ScriptedRelyingParty {
        fn new(supports: bool, outcome: Result<RelyingPartyOutcome, RelyingPartyError>) -> Self {
            Self {
                supports,
                outcome: Mutex::new(Some(outcome)),
                seen: Mutex::new(None),
            }
        }

        fn unmanaged(supports: bool) -> Self {
            Self {
                supports,
                outcome: Mutex::new(None),
                seen: Mutex::new(None),
            }
        }

        fn managed(&self) -> bool {
            self.seen.lock().expect("lock").is_some()
        }

        fn seen_request(&self) -> ExchangeRequest {
            self.seen
                .lock()
                .expect("lock")
                .clone()
                .expect("manage was called")
        }
    }

    #[async_trait]
    impl RelyingParty for ScriptedRelyingParty {
        fn supports(&self, _request: &ExchangeRequest) -> bool {
            self.supports
        }

        async fn manage(
            &self,
            request: &ExchangeRequest,
        ) -> Result<RelyingPartyOutcome, RelyingPartyError> {
            *self.seen.lock().expect("lock") = Some(request.clone());
            self.outcome
                .lock()
                .expect("lock")
                .take()
                .expect("manage was not scripted for this test")
        }
    }

    struct ScriptedDecision {
        result: Mutex<Option<Result<OpenIdToken, AuthenticationError>>>,
        seen: Mutex<Option<OpenIdToken>>,
    }

    impl ScriptedDecision {
        fn ok(token: OpenIdToken) -> Self {
            Self {
                result: Mutex::new(Some(Ok(token))),
                seen: Mutex::new(None),
            }
        }

        fn err(error: AuthenticationError) -> Self {
            Self {
                result: Mutex::new(Some(Err(error))),
                seen: Mutex::new(None),
            }
        }

        fn never() -> Self {
            Self {
                result: Mutex::new(None),
                seen: Mutex::new(None),
            }
        }

        fn decided(&self) -> bool {
            self.seen.lock().expect("lock").is_some()
        }

        fn seen_token(&self) -> OpenIdToken {
            self.seen
                .lock()
                .expect("lock")
                .clone()
                .expect("decide was called")
        }
    }

    #[async_trait]
    impl DecisionMaker for ScriptedDecision {
        async fn decide(&self, token: &OpenIdToken) -> Result<OpenIdToken, AuthenticationError> {
            *self.seen.lock().expect("lock") = Some(token.clone());
            self.result
                .lock()
                .expect("lock")
                .take()
                .expect("decide was not scripted for this test")
        }
    }

    #[derive(Default)]
    struct RecordingContext {
        installed: Mutex<Option<OpenIdToken>>,
    }

    impl RecordingContext {
        fn installed_token(&self) -> Option<OpenIdToken> {
            self.installed.lock().expect("lock").clone()
        }
    }

    impl SecurityContext for RecordingContext {
        fn set_principal(&self, _request: &ExchangeRequest, token: &OpenIdToken) -> Result<()> {
            *self.installed.lock().expect("lock") = Some(token.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStrategy {
        applied: AtomicUsize,
    }

    impl SessionAuthenticationStrategy for RecordingStrategy {
        fn on_authentication(&self, _request: &ExchangeRequest) -> Result<()> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Success double: 204 response, records the token identity and whether
    /// the request it got was the original (no attribute-exchange annotation).
    #[derive(Default)]
    struct RecordingSuccessHandler {
        seen: Mutex<Option<(String, bool)>>,
    }

    #[async_trait]
    impl AuthenticationSuccessHandler for RecordingSuccessHandler {
        async fn on_success(
            &self,
            request: &ExchangeRequest,
            token: &OpenIdToken,
        ) -> Result<Response> {
            *self.seen.lock().expect("lock") = Some((
                token.identity().to_string(),
                request.ax_policy().is_none(),
            ));
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }

    /// Failure double: 403 response, records the failure and the same
    /// original-request marker as the success double.
    #[derive(Default)]
    struct RecordingFailureHandler {
        seen: Mutex<Option<(AuthenticationFailure, bool)>>,
    }

    #[async_trait]
    impl AuthenticationFailureHandler for RecordingFailureHandler {
        async fn on_failure(
            &self,
            request: &ExchangeRequest,
            failure: &AuthenticationFailure,
        ) -> Result<Response> {
            *self.seen.lock().expect("lock") =
                Some((failure.clone(), request.ax_policy().is_none()));
            Ok(StatusCode::FORBIDDEN.into_response())
        }
    }

    struct FailingSuccessHandler;

    #[async_trait]
    impl AuthenticationSuccessHandler for FailingSuccessHandler {
        async fn on_success(
            &self,
            _request: &ExchangeRequest,
            _token: &OpenIdToken,
        ) -> Result<Response> {
            Err(anyhow!("render failed"))
        }
    }

    struct Rig {
        context: Arc<RecordingContext>,
        strategy: Arc<RecordingStrategy>,
        success: Arc<RecordingSuccessHandler>,
        failure: Arc<RecordingFailureHandler>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                context: Arc::new(RecordingContext::default()),
                strategy: Arc::new(RecordingStrategy::default()),
                success: Arc::new(RecordingSuccessHandler::default()),
                failure: Arc::new(RecordingFailureHandler::default()),
            }
        }

        fn interceptor(
            &self,
            options: InterceptorOptions,
            decision: &Arc<ScriptedDecision>,
        ) -> OpenIdInterceptor {
            OpenIdInterceptor::new(
                options,
                Arc::clone(&self.context) as Arc<dyn SecurityContext>,
                Arc::clone(decision) as Arc<dyn DecisionMaker>,
                Arc::clone(&self.success) as Arc<dyn AuthenticationSuccessHandler>,
                Arc::clone(&self.failure) as Arc<dyn AuthenticationFailureHandler>,
            )
            .with_session_strategy(Arc::clone(&self.strategy) as Arc<dyn SessionAuthenticationStrategy>)
        }
    }

    fn check_request() -> Result<ExchangeRequest> {
        Ok(ExchangeRequest::new(
            Method::GET,
            DEFAULT_CHECK_PATH.parse()?,
            HeaderMap::new(),
        ))
    }

    fn verified_alice() -> RelyingPartyOutcome {
        RelyingPartyOutcome::Verified(
            IdentityProviderResult::new("alice").with_attributes(HashMap::from([(
                "email".to_string(),
                "a@x.com".to_string(),
            )])),
        )
    }

    #[tokio::test]
    async fn non_matching_paths_pass_through_untouched() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::unmanaged(true));
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(Arc::clone(&relying_party) as Arc<dyn RelyingParty>);

        let request = ExchangeRequest::new(Method::GET, "/profile".parse()?, HeaderMap::new());
        let response = interceptor.handle(&request).await?;

        assert!(response.is_none());
        assert!(!relying_party.managed());
        assert!(!decision.decided());
        Ok(())
    }

    #[tokio::test]
    async fn matching_request_without_a_relying_party_is_a_wiring_fault() -> Result<()> {
        let rig = Rig::new();
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig.interceptor(InterceptorOptions::new(), &decision);

        let err = interceptor
            .handle(&check_request()?)
            .await
            .expect_err("no relying party");
        assert!(matches!(err, InterceptError::RelyingPartyNotSet));
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_mechanisms_pass_through() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::unmanaged(false));
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(Arc::clone(&relying_party) as Arc<dyn RelyingParty>);

        let response = interceptor.handle(&check_request()?).await?;
        assert!(response.is_none());
        assert!(!relying_party.managed());
        Ok(())
    }

    #[tokio::test]
    async fn provider_redirects_are_installed_verbatim() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(
            true,
            Ok(RelyingPartyOutcome::Redirect(Redirect::to(
                "http://idp.example/verify",
            ))),
        ));
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(Arc::clone(&relying_party) as Arc<dyn RelyingParty>);

        let response = interceptor
            .handle(&check_request()?)
            .await?
            .expect("redirect response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "http://idp.example/verify"
        );
        assert!(!decision.decided());
        Ok(())
    }

    #[tokio::test]
    async fn the_relying_party_sees_an_annotated_duplicate() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(
            true,
            Ok(RelyingPartyOutcome::Redirect(Redirect::to(
                "http://idp.example/verify",
            ))),
        ));
        let decision = Arc::new(ScriptedDecision::never());
        let options = InterceptorOptions::new().with_required_attributes(HashMap::from([(
            "email".to_string(),
            "contact/email".to_string(),
        )]));
        let interceptor = rig
            .interceptor(options, &decision)
            .with_relying_party(Arc::clone(&relying_party) as Arc<dyn RelyingParty>);

        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create()?;
        let request = check_request()?.with_session(Arc::clone(&session));

        interceptor.handle(&request).await?;

        let delegated = relying_party.seen_request();
        let policy = delegated.ax_policy().expect("annotated duplicate");
        assert!(policy.required().contains_key("email"));
        assert!(request.ax_policy().is_none());
        assert!(Arc::ptr_eq(
            delegated.session().expect("shared session"),
            &session
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verified_identities_reach_the_decision_maker_untrusted() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::new("alice", ["ROLE_USER"])));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        interceptor.handle(&check_request()?).await?;

        let attempt = decision.seen_token();
        assert_eq!(attempt.identity(), "alice");
        assert!(attempt.roles().is_empty());
        assert!(!attempt.is_authenticated());
        assert_eq!(attempt.attribute("email"), Some("a@x.com"));
        Ok(())
    }

    #[tokio::test]
    async fn success_installs_the_principal_and_asks_the_success_handler() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let granted = OpenIdToken::new("alice", ["ROLE_USER"]);
        let decision = Arc::new(ScriptedDecision::ok(granted.clone()));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let response = interceptor
            .handle(&check_request()?)
            .await?
            .expect("handler response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(rig.context.installed_token(), Some(granted));

        let (identity, saw_original) = rig.success.seen.lock().expect("lock").clone().expect("success handler ran");
        assert_eq!(identity, "alice");
        assert!(saw_original);
        Ok(())
    }

    #[tokio::test]
    async fn the_strategy_runs_only_with_a_session_present() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::new("alice", ["ROLE_USER"])));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let store = SessionStore::new(Duration::from_secs(60));
        let request = check_request()?.with_session(store.create()?);
        interceptor.handle(&request).await?;

        assert_eq!(rig.strategy.applied.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_strategy_is_skipped_for_stateless_requests() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::new("alice", ["ROLE_USER"])));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        interceptor.handle(&check_request()?).await?;

        assert_eq!(rig.strategy.applied.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn an_expired_session_cookie_still_triggers_the_strategy() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::new("alice", ["ROLE_USER"])));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let request = check_request()?.with_previous_session();
        interceptor.handle(&request).await?;

        assert_eq!(rig.strategy.applied.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rejection_reaches_the_failure_handler_with_the_attempt_attached() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::err(AuthenticationError::IdentityNotFound {
            identity: "alice".to_string(),
        }));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let response = interceptor
            .handle(&check_request()?)
            .await?
            .expect("failure response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let (failure, saw_original) = rig.failure.seen.lock().expect("lock").clone().expect("failure handler ran");
        assert_eq!(failure.token().identity(), "alice");
        assert!(failure.token().roles().is_empty());
        assert!(saw_original);
        assert!(rig.context.installed_token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn a_failing_relying_party_is_a_protocol_fault() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(
            true,
            Err(RelyingPartyError::new("discovery timed out")),
        ));
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let err = interceptor
            .handle(&check_request()?)
            .await
            .expect_err("protocol fault");
        assert!(matches!(err, InterceptError::RelyingPartyContract { .. }));
        assert!(!decision.decided());
        Ok(())
    }

    #[tokio::test]
    async fn an_empty_verified_identity_is_a_protocol_fault() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(
            true,
            Ok(RelyingPartyOutcome::Verified(IdentityProviderResult::new(
                "",
            ))),
        ));
        let decision = Arc::new(ScriptedDecision::never());
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let err = interceptor
            .handle(&check_request()?)
            .await
            .expect_err("protocol fault");
        assert!(matches!(err, InterceptError::RelyingPartyContract { .. }));
        assert!(!decision.decided());
        Ok(())
    }

    #[tokio::test]
    async fn a_role_less_decision_success_never_installs() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::unauthenticated("alice")));
        let interceptor = rig
            .interceptor(InterceptorOptions::new(), &decision)
            .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let err = interceptor
            .handle(&check_request()?)
            .await
            .expect_err("trust escalation blocked");
        assert!(matches!(err, InterceptError::UntrustedDecision { .. }));
        assert!(rig.context.installed_token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn a_failing_success_handler_propagates_fatally() -> Result<()> {
        let rig = Rig::new();
        let relying_party = Arc::new(ScriptedRelyingParty::new(true, Ok(verified_alice())));
        let decision = Arc::new(ScriptedDecision::ok(OpenIdToken::new("alice", ["ROLE_USER"])));
        let interceptor = OpenIdInterceptor::new(
            InterceptorOptions::new(),
            Arc::clone(&rig.context) as Arc<dyn SecurityContext>,
            Arc::clone(&decision) as Arc<dyn DecisionMaker>,
            Arc::new(FailingSuccessHandler) as Arc<dyn AuthenticationSuccessHandler>,
            Arc::clone(&rig.failure) as Arc<dyn AuthenticationFailureHandler>,
        )
        .with_relying_party(relying_party as Arc<dyn RelyingParty>);

        let err = interceptor
            .handle(&check_request()?)
            .await
            .expect_err("handler fault");
        assert!(matches!(err, InterceptError::SuccessHandler(_)));
        Ok(())
    }
}
