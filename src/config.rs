//! Dispatcher configuration surface.
//!
//! Everything here is decided at startup and read-only afterwards:
//! per-segment expected issuer identifiers, the unverified-identity
//! fallback flag, the CORS policy merged into HTTP results, and optional
//! overrides for the default denial responses.

use http::Method;
use std::collections::HashMap;

use crate::dispatcher::HandlerResponse;
use crate::router::Segment;

/// Cross-origin policy attached to HTTP results and preflight responses.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<Method>,
}

impl CorsConfig {
    /// The three CORS headers as (name, value) pairs.
    #[must_use]
    pub fn header_values(&self) -> [(&'static str, String); 3] {
        [
            (
                "Access-Control-Allow-Origin",
                self.allowed_origins.join(", "),
            ),
            (
                "Access-Control-Allow-Headers",
                self.allowed_headers.join(", "),
            ),
            (
                "Access-Control-Allow-Methods",
                self.allowed_methods
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ]
    }
}

/// Permissive defaults suitable for development; production deployments
/// should restrict origins.
impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".into()],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ],
        }
    }
}

/// Startup configuration for a [`Dispatcher`](crate::dispatcher::Dispatcher).
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Expected token-issuer pool id per segment. Segments without an entry
    /// skip issuer validation; [`Segment::Public`] is never validated.
    pub expected_issuers: HashMap<Segment, String>,
    /// Enables the unverified bearer-token identity fallback. Off by
    /// default and must stay off unless the deployment accepts claims from
    /// tokens whose signatures were never checked.
    pub auto_extract_identity: bool,
    pub cors: CorsConfig,
    /// Override for the default 404 result.
    pub not_found: Option<HandlerResponse>,
    /// Override for the default 403 results (all denial codes).
    pub forbidden: Option<HandlerResponse>,
    /// Override for the default 400 result.
    pub bad_request: Option<HandlerResponse>,
}

impl DispatcherConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require tokens on `segment` routes to come from the issuer whose URL
    /// ends in `pool_id`.
    #[must_use]
    pub fn expect_issuer(mut self, segment: Segment, pool_id: impl Into<String>) -> Self {
        self.expected_issuers.insert(segment, pool_id.into());
        self
    }

    #[must_use]
    pub fn auto_extract_identity(mut self, enabled: bool) -> Self {
        self.auto_extract_identity = enabled;
        self
    }

    #[must_use]
    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    #[must_use]
    pub fn not_found_response(mut self, resp: HandlerResponse) -> Self {
        self.not_found = Some(resp);
        self
    }

    #[must_use]
    pub fn forbidden_response(mut self, resp: HandlerResponse) -> Self {
        self.forbidden = Some(resp);
        self
    }

    #[must_use]
    pub fn bad_request_response(mut self, resp: HandlerResponse) -> Self {
        self.bad_request = Some(resp);
        self
    }
}
