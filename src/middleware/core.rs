use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::HandlerResponse;
use crate::event::CanonicalRequest;

/// Outcome of one middleware stage.
pub enum MiddlewareResult {
    /// Replace the canonical request; later stages and the handler see the
    /// updated value.
    Updated(CanonicalRequest),
    /// Pass the prior request through untouched.
    Unchanged,
    /// Halt the pipeline immediately; no later middleware or handler runs
    /// and the payload becomes the dispatch result verbatim.
    ShortCircuit(HandlerResponse),
}

/// A middleware stage: maps a canonical request to an updated value, the
/// unchanged value, or a short-circuit result.
///
/// Stages may suspend on async work; the pipeline awaits each stage in full
/// before advancing, never overlapping stages, since later entries may
/// depend on context an earlier one wrote (e.g. the tenant slot).
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult;
}

/// Strict sequential left-fold over one middleware list.
///
/// Returns the short-circuit response as `Err`-like `Some`, leaving `req`
/// holding the last superseding value otherwise.
pub async fn run_chain(
    chain: &[Arc<dyn Middleware>],
    req: &mut CanonicalRequest,
) -> Option<HandlerResponse> {
    for (idx, mw) in chain.iter().enumerate() {
        match mw.call(req).await {
            MiddlewareResult::Updated(updated) => *req = updated,
            MiddlewareResult::Unchanged => {}
            MiddlewareResult::ShortCircuit(resp) => {
                debug!(
                    request_id = %req.context.request_id,
                    middleware_idx = idx,
                    status = resp.status,
                    "middleware short-circuited the pipeline"
                );
                return Some(resp);
            }
        }
    }
    None
}
