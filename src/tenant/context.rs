//! Task-scoped tenant slot.
//!
//! The binding must be readable anywhere in one request's async call graph
//! without explicit parameter threading, and must never be visible to a
//! concurrently running request in the same process. `tokio::task_local!`
//! gives exactly that scoping: the slot exists for the extent of the future
//! passed to [`scope`] (including all async work it awaits) and nowhere
//! else. Code outside any scope observes no binding and fails closed.

use std::cell::RefCell;
use std::future::Future;

use super::TenantInfo;
use crate::error::TenantContextError;

tokio::task_local! {
    static TENANT_SLOT: RefCell<Option<TenantInfo>>;
}

/// Run `fut` with a fresh tenant slot holding `initial`.
///
/// The dispatcher opens one empty scope per dispatch so middleware can
/// [`set`] the resolved tenant into it; nested scopes shadow (never mutate)
/// the outer binding and release when their future completes.
pub async fn scope<F>(initial: Option<TenantInfo>, fut: F) -> F::Output
where
    F: Future,
{
    TENANT_SLOT.scope(RefCell::new(initial), fut).await
}

/// Bind `tenant` for the full extent of `fut`'s execution.
pub async fn run<F>(tenant: TenantInfo, fut: F) -> F::Output
where
    F: Future,
{
    scope(Some(tenant), fut).await
}

/// Bind `tenant` into the scope already active at call time.
///
/// Used by middleware running inside the dispatcher's per-request scope.
/// Errors when no scope is active; it cannot leak into sibling scopes.
pub fn set(tenant: TenantInfo) -> Result<(), TenantContextError> {
    TENANT_SLOT
        .try_with(|slot| {
            *slot.borrow_mut() = Some(tenant);
        })
        .map_err(|_| TenantContextError::NotInitialized)
}

/// The bound tenant, for code that must never run tenant-unaware.
pub fn current() -> Result<TenantInfo, TenantContextError> {
    TENANT_SLOT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
        .ok_or(TenantContextError::NotInitialized)
}

/// The bound tenant, or `None` outside a scope or before initialization.
#[must_use]
pub fn current_opt() -> Option<TenantInfo> {
    TENANT_SLOT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Side-effect-free probe: is a tenant bound in the active scope?
#[must_use]
pub fn is_active() -> bool {
    TENANT_SLOT
        .try_with(|slot| slot.borrow().is_some())
        .unwrap_or(false)
}
