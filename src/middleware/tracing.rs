use async_trait::async_trait;
use tracing::info;

use super::{Middleware, MiddlewareResult};
use crate::event::CanonicalRequest;

/// Logs one structured line per dispatched request.
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult {
        info!(
            request_id = %req.context.request_id,
            trigger = ?req.trigger,
            method = ?req.method,
            path = req.path.as_deref().unwrap_or("-"),
            segment = %req.context.segment,
            user_id = req
                .context
                .identity
                .as_ref()
                .map(|i| i.user_id.as_str())
                .unwrap_or("-"),
            "request dispatched"
        );
        MiddlewareResult::Unchanged
    }
}
