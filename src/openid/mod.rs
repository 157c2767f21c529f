//! Delegated authentication core.
//!
//! This module is the interception state machine and everything it touches:
//!
//! - [`interceptor::OpenIdInterceptor`] watches the configured check path,
//!   delegates verification to a [`relying_party::RelyingParty`], and turns a
//!   verified identity into an authenticated principal.
//! - [`token::OpenIdToken`] is the credential. It is authenticated only when
//!   constructed with roles; nothing can upgrade an existing token in place.
//! - Collaborators (security context, decision-maker, session strategy,
//!   success/failure handlers) are trait objects injected at construction so
//!   deployments can swap any of them.
//!
//! The relying party is a black box here. The only implementation shipped is
//! [`loopback::LoopbackRelyingParty`], a development stand-in that short
//! circuits the provider round trip back to the check path.

pub mod context;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod interceptor;
pub mod loopback;
pub mod relying_party;
pub mod request;
pub mod session;
pub mod token;

pub use context::{SecurityContext, SessionSecurityContext};
pub use decision::{
    DecisionMaker, IdentityRecord, IdentityStore, InMemoryIdentityStore, StoreBackedDecisionMaker,
};
pub use error::{
    AuthenticationError, AuthenticationFailure, InterceptError, RelyingPartyError,
    TrustEscalationError,
};
pub use handlers::{
    AuthenticationFailureHandler, AuthenticationSuccessHandler, LoginRedirectFailureHandler,
    RedirectSuccessHandler,
};
pub use interceptor::{DEFAULT_CHECK_PATH, InterceptorOptions, OpenIdInterceptor};
pub use loopback::LoopbackRelyingParty;
pub use relying_party::{IdentityProviderResult, Redirect, RelyingParty, RelyingPartyOutcome};
pub use request::{AxPolicy, ExchangeRequest};
pub use session::{
    MigrateSessionStrategy, Session, SessionAuthenticationStrategy, SessionHandle, SessionStore,
};
pub use token::OpenIdToken;
