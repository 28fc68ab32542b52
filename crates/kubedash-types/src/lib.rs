//! Shared types for kubedash
//!
//! This crate contains the request-local values passed between the header
//! extractor, the configuration builder and the client manager.

use std::collections::BTreeMap;
use std::fmt;

use http::HeaderMap;
use serde::Serialize;

// ============================================================================
// Request Types
// ============================================================================

/// The parts of an inbound HTTP request that credential resolution looks at
#[derive(Clone, Debug, Default)]
pub struct IncomingRequest {
    pub headers: HeaderMap,
    /// Whether the request arrived over a TLS-terminated connection
    pub tls: bool,
}

impl IncomingRequest {
    pub fn new(headers: HeaderMap, tls: bool) -> Self {
        Self { headers, tls }
    }

    /// Plain-HTTP request with the given headers
    pub fn insecure(headers: HeaderMap) -> Self {
        Self::new(headers, false)
    }

    /// TLS request with the given headers
    pub fn secure(headers: HeaderMap) -> Self {
        Self::new(headers, true)
    }

    /// Capture headers from an `http::Request`. The serving layer knows
    /// whether the connection was TLS, so it passes that in.
    pub fn from_http<B>(request: &http::Request<B>, tls: bool) -> Self {
        Self::new(request.headers().clone(), tls)
    }
}

// ============================================================================
// Credential Types
// ============================================================================

/// Authentication and impersonation material read from request headers
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialContext {
    pub bearer_token: Option<String>,
    pub impersonate_user: Option<String>,
    /// Groups in header declaration order
    pub impersonate_groups: Vec<String>,
    /// Lower-cased extra key to values in header declaration order
    pub impersonate_extra: BTreeMap<String, Vec<String>>,
}

impl CredentialContext {
    /// Context carrying only a bearer token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn has_token(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Whether any impersonation header was seen, honoured or not
    pub fn requests_impersonation(&self) -> bool {
        self.impersonate_user.is_some()
            || !self.impersonate_groups.is_empty()
            || !self.impersonate_extra.is_empty()
    }
}

// Tokens never end up in debug output
impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("impersonate_user", &self.impersonate_user)
            .field("impersonate_groups", &self.impersonate_groups)
            .field("impersonate_extra", &self.impersonate_extra)
            .finish()
    }
}

/// Impersonation block forwarded to the cluster API
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Impersonation {
    pub user: String,
    pub groups: Vec<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

impl Impersonation {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            groups: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let ctx = CredentialContext::with_token("super-secret");
        let out = format!("{:?}", ctx);
        assert!(!out.contains("super-secret"));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn test_requests_impersonation() {
        let mut ctx = CredentialContext::default();
        assert!(!ctx.requests_impersonation());

        ctx.impersonate_groups.push("admins".to_string());
        assert!(ctx.requests_impersonation());
    }

    #[test]
    fn test_from_http_keeps_headers() {
        let request = http::Request::builder()
            .header("Authorization", "Bearer abc")
            .body(())
            .unwrap();
        let incoming = IncomingRequest::from_http(&request, true);
        assert!(incoming.tls);
        assert_eq!(incoming.headers.get("authorization").unwrap(), "Bearer abc");
    }

    #[test]
    fn test_impersonation_serializes() {
        let mut imp = Impersonation::new("jane");
        imp.groups.push("dev".to_string());
        let json = serde_json::to_value(&imp).unwrap();
        assert_eq!(json["user"], "jane");
        assert_eq!(json["groups"][0], "dev");
    }
}
