//! Request view handed through the interception pipeline.
//!
//! [`ExchangeRequest`] is a detached snapshot of the inbound HTTP exchange:
//! method, URI, headers, parsed parameters, and the session linkage. The
//! relying party never sees the original; it gets a [`ExchangeRequest::duplicate`]
//! carrying the attribute-exchange annotation, so nothing it does shows
//! through on caller-visible state.

use axum::http::{HeaderMap, Method, Uri};
use std::collections::HashMap;
use std::sync::Arc;

use crate::openid::session::SessionHandle;

/// Attribute exchange lists a deployment wants from the identity provider,
/// keyed by alias with the provider-side type as the value.
///
/// Passed through from configuration unchanged; the interceptor does not
/// validate shapes beyond "mapping".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxPolicy {
    required: HashMap<String, String>,
    optional: HashMap<String, String>,
}

impl AxPolicy {
    #[must_use]
    pub fn new(required: HashMap<String, String>, optional: HashMap<String, String>) -> Self {
        Self { required, optional }
    }

    #[must_use]
    pub fn required(&self) -> &HashMap<String, String> {
        &self.required
    }

    #[must_use]
    pub fn optional(&self) -> &HashMap<String, String> {
        &self.optional
    }

    /// All requested aliases, required first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.required
            .keys()
            .chain(self.optional.keys())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// One inbound HTTP exchange as the authentication core sees it.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    session: Option<SessionHandle>,
    previous_session: bool,
    ax: Option<AxPolicy>,
}

impl ExchangeRequest {
    /// Snapshot an exchange. Query parameters are parsed from the URI;
    /// form-encoded body parameters can be merged in with
    /// [`ExchangeRequest::with_form_params`].
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let params = uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method,
            uri,
            headers,
            params,
            session: None,
            previous_session: false,
            ax: None,
        }
    }

    /// Attach the live session resolved from the client's cookie.
    #[must_use]
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    /// Record that the client presented session credentials, whether or not
    /// they still resolve to a live session.
    #[must_use]
    pub fn with_previous_session(mut self) -> Self {
        self.previous_session = true;
        self
    }

    /// Merge form-encoded body parameters; they win over query duplicates.
    #[must_use]
    pub fn with_form_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Annotate with the attribute exchange the relying party may request.
    #[must_use]
    pub fn with_ax_policy(mut self, policy: AxPolicy) -> Self {
        self.ax = Some(policy);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn has_previous_session(&self) -> bool {
        self.previous_session
    }

    #[must_use]
    pub fn ax_policy(&self) -> Option<&AxPolicy> {
        self.ax.as_ref()
    }

    /// Exact-path check against a configured path.
    #[must_use]
    pub fn matches_path(&self, configured: &str) -> bool {
        self.path() == configured
    }

    /// Copy of this exchange with a fresh, empty annotation store.
    ///
    /// Method, URI, headers, parameters, and the session linkage are shared;
    /// the attribute-exchange annotation starts empty so nothing set on the
    /// copy leaks back.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            params: self.params.clone(),
            session: self.session.as_ref().map(Arc::clone),
            previous_session: self.previous_session,
            ax: None,
        }
    }
}
