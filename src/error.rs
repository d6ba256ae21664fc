//! Typed errors for route-table construction and tenant-context access.
//!
//! Dispatch denials (not-found, forbidden, bad-request) are deliberately
//! *not* errors: they are ordinary [`HandlerResponse`](crate::dispatcher::HandlerResponse)
//! values carrying a stable `code` discriminator, because upstream gateways
//! legitimately produce unroutable or unauthorized events and the host still
//! needs a well-formed result to return.

use thiserror::Error;

/// Errors raised while building a [`RouteTable`](crate::router::RouteTable).
///
/// These only occur at startup; a successfully built table never fails at
/// resolve time.
#[derive(Debug, Error)]
pub enum RouteTableError {
    /// A pattern declared the same `{name}` parameter twice.
    #[error("duplicate path parameter `{name}` in pattern `{pattern}`")]
    DuplicateParam { pattern: String, name: String },

    /// A pattern segment could not be compiled (e.g. unbalanced braces).
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised by the tenant context store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantContextError {
    /// `current()` was called outside an active scope, or inside a scope that
    /// has no tenant bound yet. Code that must never run tenant-unaware uses
    /// this to fail closed.
    #[error("tenant context not initialized for this request")]
    NotInitialized,
}
