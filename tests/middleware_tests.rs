//! Middleware pipeline tests: ordering, short-circuiting, and the standard
//! tenant/feature guards.

mod common;

use async_trait::async_trait;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use triggermux::dispatcher::{Dispatcher, HandlerResponse};
use triggermux::event::CanonicalRequest;
use triggermux::middleware::{
    FeatureGuard, Middleware, MiddlewareResult, TenantContextMiddleware, TenantGuard,
};
use triggermux::router::{RouteTable, Segment};
use triggermux::tenant::context;

/// Records its label into a shared log, to observe execution order.
struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Middleware for Recorder {
    async fn call(&self, _req: &CanonicalRequest) -> MiddlewareResult {
        self.log.lock().unwrap().push(self.label);
        MiddlewareResult::Unchanged
    }
}

/// Rejects everything with a fixed payload.
struct Reject;

#[async_trait]
impl Middleware for Reject {
    async fn call(&self, _req: &CanonicalRequest) -> MiddlewareResult {
        MiddlewareResult::ShortCircuit(HandlerResponse::denied(403, "rejected", "rejected"))
    }
}

/// Stamps a marker into the request body, observable by the handler.
struct Stamp;

#[async_trait]
impl Middleware for Stamp {
    async fn call(&self, req: &CanonicalRequest) -> MiddlewareResult {
        let mut updated = req.clone();
        updated.body["stamped"] = json!(true);
        MiddlewareResult::Updated(updated)
    }
}

fn recorder(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Middleware> {
    Arc::new(Recorder {
        label,
        log: Arc::clone(log),
    })
}

#[tokio::test]
async fn pipeline_runs_global_then_segment_then_route() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(AtomicUsize::new(0));

    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route_with(
            Method::GET,
            "/orders",
            common::counting_handler(Arc::clone(&hits)),
            vec![recorder("route", &log)],
        )
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(recorder("global", &log));
    dispatcher.segment_middleware(Segment::Protected, recorder("segment", &log));

    let resp = dispatcher
        .dispatch(common::http_event("GET", "/orders", None))
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(*log.lock().unwrap(), vec!["global", "segment", "route"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn short_circuit_skips_later_stages_and_handler() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(AtomicUsize::new(0));

    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route_with(
            Method::GET,
            "/orders",
            common::counting_handler(Arc::clone(&hits)),
            vec![recorder("route", &log)],
        )
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(recorder("global", &log));
    dispatcher.segment_middleware(Segment::Protected, Arc::new(Reject));
    dispatcher.segment_middleware(Segment::Protected, recorder("after-reject", &log));

    let resp = dispatcher
        .dispatch(common::http_event("GET", "/orders", None))
        .await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.code(), Some("rejected"));
    // The rejection payload came back verbatim; nothing after it ran.
    assert_eq!(*log.lock().unwrap(), vec!["global"]);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn updated_request_supersedes_prior_value() {
    let handler = triggermux::handler_fn(|req| async move {
        HandlerResponse::json(200, req.body)
    });
    let table = RouteTable::builder()
        .route(Method::POST, "/items", handler)
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(Stamp));

    let mut event = common::http_event("POST", "/items", None);
    event["body"] = json!("{\"name\":\"widget\"}");
    let resp = dispatcher.dispatch(event).await;
    assert_eq!(resp.body, json!({ "name": "widget", "stamped": true }));
}

#[tokio::test]
async fn tenant_guard_rejects_without_tenant_context() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route(Method::GET, "/orders", common::counting_handler(Arc::clone(&hits)))
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.segment_middleware(Segment::Protected, Arc::new(TenantGuard::new()));

    let resp = dispatcher
        .dispatch(common::http_event("GET", "/orders", None))
        .await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.code(), Some("tenant_context_missing"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tenant_guard_passes_with_claim_derived_tenant() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route(Method::GET, "/orders", common::counting_handler(Arc::clone(&hits)))
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));
    dispatcher.segment_middleware(Segment::Protected, Arc::new(TenantGuard::new()));

    let event = common::http_event(
        "GET",
        "/orders",
        Some(common::tenant_claims("pool-A", "tenant-7")),
    );
    let resp = dispatcher.dispatch(event).await;
    assert_eq!(resp.status, 200);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tenant_guard_bypass_group_proceeds_without_tenant() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Admin)
        .route(Method::GET, "/all-tenants", common::counting_handler(Arc::clone(&hits)))
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));
    dispatcher.segment_middleware(Segment::Admin, Arc::new(TenantGuard::new()));

    let claims = json!({
        "sub": "op-1",
        "cognito:groups": ["cross-tenant-admin"],
    });
    let resp = dispatcher
        .dispatch(common::http_event("GET", "/all-tenants", Some(claims)))
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tenant_guard_always_rejects_blank_tenant_id() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route(Method::GET, "/orders", common::counting_handler(Arc::clone(&hits)))
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));
    dispatcher.segment_middleware(Segment::Protected, Arc::new(TenantGuard::new()));

    // Blank tenant id in claims, plus the bypass group: still rejected.
    let claims = json!({
        "sub": "user-1",
        "cognito:groups": ["cross-tenant-admin"],
        "custom:tenant_id": "   ",
        "custom:tenant_kind": "organization",
        "custom:owner_user_id": "user-1",
        "custom:country_code": "DE",
    });
    let resp = dispatcher
        .dispatch(common::http_event("GET", "/orders", Some(claims)))
        .await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.code(), Some("tenant_context_missing"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn feature_guard_requires_flag_on_bound_tenant() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route_with(
            Method::GET,
            "/crm/leads",
            common::counting_handler(Arc::clone(&hits)),
            vec![Arc::new(FeatureGuard::new("crm"))],
        )
        .route_with(
            Method::GET,
            "/billing/invoices",
            common::counting_handler(Arc::clone(&hits)),
            vec![Arc::new(FeatureGuard::new("billing"))],
        )
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));

    let claims = common::tenant_claims("pool-A", "tenant-7");
    let resp = dispatcher
        .dispatch(common::http_event("GET", "/crm/leads", Some(claims.clone())))
        .await;
    assert_eq!(resp.status, 200);

    // Same tenant lacks the billing flag.
    let resp = dispatcher
        .dispatch(common::http_event("GET", "/billing/invoices", Some(claims)))
        .await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.code(), Some("feature_access_denied"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn feature_guard_before_tenant_init_always_fails() {
    let hits = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::builder()
        .segment(Segment::Protected)
        .route(Method::GET, "/crm/leads", common::counting_handler(Arc::clone(&hits)))
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    // Misconfigured on purpose: guard ahead of tenant initialization.
    dispatcher.add_middleware(Arc::new(FeatureGuard::new("crm")));
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));

    let event = common::http_event(
        "GET",
        "/crm/leads",
        Some(common::tenant_claims("pool-A", "tenant-7")),
    );
    let resp = dispatcher.dispatch(event).await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.code(), Some("feature_access_denied"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn guards_never_mutate_the_tenant_store() {
    let probe = triggermux::handler_fn(|_req| async move {
        HandlerResponse::json(200, json!({ "active": context::is_active() }))
    });
    let table = RouteTable::builder()
        .segment(Segment::Admin)
        .route(Method::GET, "/all-tenants", probe)
        .build()
        .unwrap();
    let mut dispatcher = Dispatcher::new(table);
    dispatcher.add_middleware(Arc::new(TenantContextMiddleware));
    dispatcher.segment_middleware(Segment::Admin, Arc::new(TenantGuard::new()));

    // Bypass identity, no tenant data: the guard passes without binding
    // anything into the store.
    let claims = json!({
        "sub": "op-1",
        "cognito:groups": ["cross-tenant-admin"],
    });
    let resp = dispatcher
        .dispatch(common::http_event("GET", "/all-tenants", Some(claims)))
        .await;
    assert_eq!(resp.body, json!({ "active": false }));
}
