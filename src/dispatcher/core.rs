//! Dispatcher core - orchestrates one trigger event from detection to
//! handler result.
//!
//! Terminal on the first of: handler result, guard rejection, not-found,
//! issuer-validation failure, unknown trigger. The dispatcher applies no
//! implicit try/catch around middleware or handlers; unstructured failures
//! propagate to the caller, and denial paths are never retried internally.

use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::event::{
    self, CanonicalRequest, RequestContext, TriggerKind,
};
use crate::ids::RequestId;
use crate::middleware::{run_chain, Middleware};
use crate::router::{normalize_path, RouteResolution, RouteTable, Segment};
use crate::tenant::context;

/// Maximum inline response headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>` because they repeat heavily (content-type,
/// CORS headers); `Arc::clone()` is an O(1) refcount bump. Values are
/// per-response data and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Result of one dispatch: status code, headers, and JSON body.
///
/// For HTTP triggers this maps onto a gateway response; for non-HTTP
/// triggers it is returned to the host unmodified.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type` header preset.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Plain error response without a stable discriminator.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// Denial response carrying a stable `code` discriminator
    /// (`not_found`, `issuer_mismatch`, `tenant_context_missing`,
    /// `feature_access_denied`, `bad_request`).
    #[must_use]
    pub fn denied(status: u16, code: &str, message: &str) -> Self {
        Self::json(status, json!({ "error": message, "code": code }))
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive name match).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Stable discriminator of a denial response, if present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

/// A registered business-logic handler.
///
/// Handlers may suspend on async work; the dispatcher awaits the result in
/// full. No implicit timeout applies - a handler that never settles hangs
/// the dispatch, and bounding that is the host's responsibility.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: CanonicalRequest) -> HandlerResponse;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResponse> + Send,
{
    async fn handle(&self, req: CanonicalRequest) -> HandlerResponse {
        (self.0)(req).await
    }
}

/// Wrap an async function or closure as a registrable [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResponse> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Routes one already-received trigger event to exactly one handler.
///
/// Holds the immutable route table, the ordered global middleware list, and
/// per-segment middleware bundles. The dispatcher never parallelizes
/// independent requests itself; the host may invoke [`dispatch`](Self::dispatch)
/// concurrently for independent events, and per-request state (canonical
/// request, tenant binding) stays strictly request-scoped.
pub struct Dispatcher {
    table: RouteTable,
    config: DispatcherConfig,
    global: Vec<Arc<dyn Middleware>>,
    segment_bundles: HashMap<Segment, Vec<Arc<dyn Middleware>>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self::with_config(table, DispatcherConfig::default())
    }

    #[must_use]
    pub fn with_config(table: RouteTable, config: DispatcherConfig) -> Self {
        Self {
            table,
            config,
            global: Vec::new(),
            segment_bundles: HashMap::new(),
        }
    }

    /// Append to the ordered global middleware list, run first on every
    /// dispatch.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.global.push(mw);
    }

    /// Append to a segment's middleware bundle, run between the global list
    /// and the route's own list whenever a route in `segment` resolves.
    pub fn segment_middleware(&mut self, segment: Segment, mw: Arc<dyn Middleware>) {
        self.segment_bundles.entry(segment).or_default().push(mw);
    }

    /// Dispatch one raw trigger event and return the terminal result.
    ///
    /// Step order is fixed: detect trigger → (HTTP) preflight short-circuit
    /// → resolve → normalize → issuer validation → global → segment → route
    /// middleware → handler → trigger-specific result decoration.
    pub async fn dispatch(&self, event: Value) -> HandlerResponse {
        match TriggerKind::detect(&event) {
            TriggerKind::Http => self.dispatch_http(event).await,
            TriggerKind::EventBus => self.dispatch_event_bus(event).await,
            TriggerKind::Queue => self.dispatch_queue(event).await,
            TriggerKind::Direct => self.dispatch_direct(event).await,
            TriggerKind::Unknown => {
                warn!("unrecognized trigger shape");
                self.bad_request_response()
            }
        }
    }

    async fn dispatch_http(&self, event: Value) -> HandlerResponse {
        let Some(method) = event::http_method(&event) else {
            return self.bad_request_response();
        };
        let path = event::http_path(&event).unwrap_or_else(|| "/".to_string());

        // Preflight never reaches routing; the gateway expects a bare 204
        // with the CORS policy attached.
        if method == Method::OPTIONS {
            debug!(path = %path, "preflight short-circuit");
            let mut resp = HandlerResponse::new(204, HeaderVec::new(), Value::Null);
            for (name, value) in self.config.cors.header_values() {
                resp.set_header(name, value);
            }
            return resp;
        }

        let Some(resolution) = self.table.resolve(&method, &path) else {
            return self.decorate_http(self.not_found_response());
        };

        let headers = event::http_headers(&event);
        let identity = crate::identity::Identity::extract(&event, self.config.auto_extract_identity);
        let request_id = RequestId::from_headers(&headers);

        // Issuer validation gates every non-public segment that has an
        // expected issuer configured; the handler never runs on mismatch.
        if resolution.segment != Segment::Public {
            if let Some(expected) = self.config.expected_issuers.get(&resolution.segment) {
                let valid = identity
                    .as_ref()
                    .map(|i| i.validate_issuer(expected))
                    .unwrap_or(false);
                if !valid {
                    info!(
                        request_id = %request_id,
                        segment = %resolution.segment,
                        "issuer validation failed, dispatch forbidden"
                    );
                    return self.decorate_http(self.forbidden_response(
                        "issuer_mismatch",
                        "token issuer not accepted for this segment",
                    ));
                }
            }
        }

        // Locally-extracted parameters win on collision; upstream-only keys
        // are preserved.
        let mut path_params = event::upstream_path_params(&event);
        for (name, value) in &resolution.params {
            path_params.insert(name.to_string(), value.clone());
        }

        let body = event::http_body(&event);
        let query_params = event::http_query_params(&event);
        let req = CanonicalRequest {
            trigger: TriggerKind::Http,
            method: Some(method),
            path: Some(normalize_path(&path)),
            body,
            path_params,
            query_params,
            headers,
            context: RequestContext {
                segment: resolution.segment,
                identity,
                request_id,
            },
            raw: event,
        };

        let resp = self.run_scoped(req, resolution).await;
        self.decorate_http(resp)
    }

    async fn dispatch_event_bus(&self, event: Value) -> HandlerResponse {
        let key = event::event_bus_key(&event).unwrap_or_default().to_string();
        let Some(resolution) = self.table.resolve_key(&key) else {
            info!(key = %key, "no event route or default handler");
            return self.not_found_response();
        };
        let body = event::event_bus_detail(&event);
        let req = self.internal_request(TriggerKind::EventBus, event, body, resolution.segment);
        self.run_scoped(req, resolution).await
    }

    async fn dispatch_queue(&self, event: Value) -> HandlerResponse {
        let records = event::queue_records(&event);
        if records.is_empty() {
            return self.bad_request_response();
        }
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let Some(resolution) = self.table.resolve_key(&record.source) else {
                info!(source = %record.source, "no queue route or default handler");
                results.push(self.not_found_response());
                continue;
            };
            let req = self.internal_request(
                TriggerKind::Queue,
                event.clone(),
                record.body,
                resolution.segment,
            );
            results.push(self.run_scoped(req, resolution).await);
        }
        // A single-record batch passes the handler result through verbatim;
        // larger batches aggregate per-record results in order.
        if results.len() == 1 {
            if let Some(only) = results.pop() {
                return only;
            }
        }
        match serde_json::to_value(&results) {
            Ok(body) => HandlerResponse::json(200, body),
            Err(_) => HandlerResponse::error(500, "failed to serialize batch results"),
        }
    }

    async fn dispatch_direct(&self, event: Value) -> HandlerResponse {
        let Some(resolution) = self.table.resolve_default() else {
            info!("no default handler for direct invocation");
            return self.not_found_response();
        };
        let body = event.clone();
        let req = self.internal_request(TriggerKind::Direct, event, body, resolution.segment);
        self.run_scoped(req, resolution).await
    }

    /// Run middleware and handler inside one fresh tenant scope.
    ///
    /// The scope spans the whole chain, so a tenant bound by middleware is
    /// visible to every later stage and to the handler's entire async call
    /// graph, and is released when the chain completes. Concurrent
    /// dispatches each get their own scope and never cross-observe.
    async fn run_scoped(
        &self,
        mut req: CanonicalRequest,
        resolution: RouteResolution,
    ) -> HandlerResponse {
        let segment_chain = self
            .segment_bundles
            .get(&resolution.segment)
            .cloned()
            .unwrap_or_default();
        context::scope(None, async move {
            for chain in [
                self.global.as_slice(),
                segment_chain.as_slice(),
                resolution.middleware.as_slice(),
            ] {
                if let Some(resp) = run_chain(chain, &mut req).await {
                    return resp;
                }
            }
            info!(
                request_id = %req.context.request_id,
                pattern = %resolution.pattern,
                "invoking handler"
            );
            resolution.handler.handle(req).await
        })
        .await
    }

    fn internal_request(
        &self,
        trigger: TriggerKind,
        raw: Value,
        body: Value,
        segment: Segment,
    ) -> CanonicalRequest {
        CanonicalRequest {
            trigger,
            raw,
            method: None,
            path: None,
            body,
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            headers: HashMap::new(),
            context: RequestContext {
                segment,
                identity: None,
                request_id: RequestId::new(),
            },
        }
    }

    /// Merge the CORS policy into an HTTP result without overriding values
    /// the handler already set.
    fn decorate_http(&self, mut resp: HandlerResponse) -> HandlerResponse {
        for (name, value) in self.config.cors.header_values() {
            if resp.get_header(name).is_none() {
                resp.set_header(name, value);
            }
        }
        resp
    }

    fn not_found_response(&self) -> HandlerResponse {
        self.config
            .not_found
            .clone()
            .unwrap_or_else(|| HandlerResponse::denied(404, "not_found", "no route matched"))
    }

    fn forbidden_response(&self, code: &str, message: &str) -> HandlerResponse {
        self.config
            .forbidden
            .clone()
            .unwrap_or_else(|| HandlerResponse::denied(403, code, message))
    }

    fn bad_request_response(&self) -> HandlerResponse {
        self.config.bad_request.clone().unwrap_or_else(|| {
            HandlerResponse::denied(400, "bad_request", "unrecognized trigger shape")
        })
    }
}
