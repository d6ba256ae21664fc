use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Middleware, MiddlewareResult};
use crate::dispatcher::HandlerResponse;
use crate::event::CanonicalRequest;
use crate::tenant::{context, TenantInfo};

/// Group granting cross-tenant access, bypassing the tenant guard.
pub const DEFAULT_BYPASS_GROUP: &str = "cross-tenant-admin";

/// Resolves tenant data and binds it into the active per-request scope.
///
/// Precedence: authenticated-claim-derived fields when present, else
/// propagation headers from a trusted upstream invocation, else the tenant
/// stays absent. Absence is not an error here; downstream guards decide
/// whether that is acceptable for the resolved segment.
pub struct TenantContextMiddleware;

#[async_trait]
impl Middleware for TenantContextMiddleware {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult {
        let resolved = req
            .context
            .identity
            .as_ref()
            .and_then(|identity| TenantInfo::from_claims(&identity.claims))
            .or_else(|| TenantInfo::from_headers(&req.headers));

        match resolved {
            Some(tenant) => {
                debug!(
                    request_id = %req.context.request_id,
                    tenant_id = %tenant.tenant_id,
                    "tenant context initialized"
                );
                if context::set(tenant).is_err() {
                    // Only reachable when run outside a dispatcher scope.
                    warn!("tenant resolution succeeded but no request scope is active");
                }
            }
            None => {
                debug!(
                    request_id = %req.context.request_id,
                    "no tenant data in claims or propagation headers"
                );
            }
        }
        MiddlewareResult::Unchanged
    }
}

/// Fails closed unless a tenant is bound or the identity holds the
/// designated cross-tenant bypass group.
///
/// A bound tenant with a blank or whitespace id is always rejected, bypass
/// group or not. Pure with respect to the tenant store.
pub struct TenantGuard {
    bypass_group: String,
}

impl TenantGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bypass_group: DEFAULT_BYPASS_GROUP.to_string(),
        }
    }

    #[must_use]
    pub fn with_bypass_group(group: impl Into<String>) -> Self {
        Self {
            bypass_group: group.into(),
        }
    }
}

impl Default for TenantGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for TenantGuard {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult {
        if let Some(tenant) = context::current_opt() {
            if tenant.tenant_id.trim().is_empty() {
                warn!(
                    request_id = %req.context.request_id,
                    "tenant guard rejected: bound tenant has blank id"
                );
                return MiddlewareResult::ShortCircuit(HandlerResponse::denied(
                    403,
                    "tenant_context_missing",
                    "tenant context missing",
                ));
            }
            return MiddlewareResult::Unchanged;
        }

        let bypass = req
            .context
            .identity
            .as_ref()
            .is_some_and(|i| i.has_any_group(&[self.bypass_group.as_str()]));
        if bypass {
            debug!(
                request_id = %req.context.request_id,
                group = %self.bypass_group,
                "tenant guard bypassed by cross-tenant group"
            );
            return MiddlewareResult::Unchanged;
        }

        warn!(
            request_id = %req.context.request_id,
            "tenant guard rejected: no tenant bound"
        );
        MiddlewareResult::ShortCircuit(HandlerResponse::denied(
            403,
            "tenant_context_missing",
            "tenant context missing",
        ))
    }
}
