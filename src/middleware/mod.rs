//! Ordered middleware pipeline and the standard guards.
//!
//! The dispatcher runs three lists sequentially (global, then the resolved
//! segment's bundle, then the route's own list) as a strict left-fold with
//! early exit on [`MiddlewareResult::ShortCircuit`].

mod core;
mod feature;
mod tenant;
mod tracing;

pub use core::{run_chain, Middleware, MiddlewareResult};
pub use feature::FeatureGuard;
pub use tenant::{TenantContextMiddleware, TenantGuard, DEFAULT_BYPASS_GROUP};
pub use tracing::TracingMiddleware;
