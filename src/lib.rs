//! # Delegi (Delegated OpenID Authentication)
//!
//! `delegi` turns a completed external identity check into a trusted,
//! role-bearing session principal. It watches one configured check path,
//! delegates verification to a relying party, and reconciles the outcome
//! with the session and the security context.
//!
//! ## Interception Model
//!
//! A request hitting the check path is handed to the relying party with an
//! attribute-exchange-annotated duplicate of itself. The relying party either
//! redirects the client to the identity provider or asserts a verified
//! identity. Verified identities become unauthenticated tokens submitted to
//! the authentication decision-maker; only the decision-maker grants roles.
//!
//! - **One-way trust:** a token is authenticated iff it was constructed with
//!   roles. Nothing can upgrade an existing token in place.
//! - **Fatal vs. recoverable:** missing wiring and relying-party contract
//!   breaches are fatal and surface as 500s. Rejected identities are routed
//!   to the failure handler and rendered on the login page.
//!
//! ## Sessions
//!
//! Sessions are cookie-bound and stored server-side, keyed by the SHA-256 of
//! a random URL-safe token. Successful logins migrate the session to a fresh
//! token to defeat session fixation. Stateless deployments can disable the
//! migration strategy entirely.

pub mod api;
pub mod cli;
pub mod openid;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
