use async_trait::async_trait;
use tracing::warn;

use super::tenant::DEFAULT_BYPASS_GROUP;
use super::{Middleware, MiddlewareResult};
use crate::dispatcher::HandlerResponse;
use crate::event::CanonicalRequest;
use crate::tenant::context;

/// Fails closed unless the bound tenant carries the required feature flag
/// or the identity holds the cross-tenant bypass group.
///
/// Must run after [`TenantContextMiddleware`](super::TenantContextMiddleware):
/// with no tenant bound the flag check cannot succeed, so placing this guard
/// before tenant initialization always denies. Pure with respect to the
/// tenant store.
pub struct FeatureGuard {
    flag: String,
    bypass_group: String,
}

impl FeatureGuard {
    #[must_use]
    pub fn new(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            bypass_group: DEFAULT_BYPASS_GROUP.to_string(),
        }
    }

    #[must_use]
    pub fn with_bypass_group(mut self, group: impl Into<String>) -> Self {
        self.bypass_group = group.into();
        self
    }
}

#[async_trait]
impl Middleware for FeatureGuard {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult {
        if context::current_opt().is_some_and(|t| t.has_feature(&self.flag)) {
            return MiddlewareResult::Unchanged;
        }
        let bypass = req
            .context
            .identity
            .as_ref()
            .is_some_and(|i| i.has_any_group(&[self.bypass_group.as_str()]));
        if bypass {
            return MiddlewareResult::Unchanged;
        }
        warn!(
            request_id = %req.context.request_id,
            flag = %self.flag,
            "feature guard rejected"
        );
        MiddlewareResult::ShortCircuit(HandlerResponse::denied(
            403,
            "feature_access_denied",
            "feature access denied",
        ))
    }
}
