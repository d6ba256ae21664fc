//! Trigger detection and event normalization.
//!
//! Each dispatch starts from one raw JSON event whose shape depends on the
//! upstream trigger. [`TriggerKind::detect`] classifies the event with a
//! fixed-priority sequence of structural predicates, and the normalizers in
//! this module fold every trigger shape into one [`CanonicalRequest`] so the
//! rest of the pipeline never sniffs raw event shapes again.
//!
//! Normalization is deliberately lossy-tolerant: malformed or absent bodies
//! and query strings degrade to empty values instead of failing the
//! dispatch, because upstream gateways legitimately send untyped or empty
//! payloads.

use base64::{engine::general_purpose, Engine as _};
use http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::identity::Identity;
use crate::ids::RequestId;
use crate::router::Segment;

/// Upstream event source kind, detected structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Event-bus notification carrying a `detail-type` routing key.
    EventBus,
    /// HTTP gateway call (REST or HTTP API payload format).
    Http,
    /// Queue batch of records.
    Queue,
    /// Direct invocation: the whole payload is the body.
    Direct,
    /// Unrecognized shape; dispatch maps this to a bad-request result.
    Unknown,
}

impl TriggerKind {
    /// Classify a raw event.
    ///
    /// Predicates run in fixed priority order: event-bus marker → HTTP
    /// marker → queue-record marker → direct-invocation marker → unknown.
    /// The order is part of the contract; an HTTP payload that also carried
    /// a `detail-type` key would classify as event-bus.
    #[must_use]
    pub fn detect(event: &Value) -> TriggerKind {
        let Some(obj) = event.as_object() else {
            return TriggerKind::Unknown;
        };
        if obj.contains_key("detail-type") && obj.contains_key("detail") {
            return TriggerKind::EventBus;
        }
        if obj.contains_key("httpMethod")
            || event.pointer("/requestContext/http/method").is_some()
        {
            return TriggerKind::Http;
        }
        if event
            .pointer("/Records/0/eventSource")
            .and_then(Value::as_str)
            == Some("aws:sqs")
        {
            return TriggerKind::Queue;
        }
        if obj.is_empty() {
            return TriggerKind::Unknown;
        }
        TriggerKind::Direct
    }
}

/// Per-dispatch context travelling with the canonical request.
///
/// Tenant data is deliberately absent here: it lives in the task-local
/// store (`tenant::context`) so it stays readable anywhere in the request's
/// async chain without parameter threading.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub segment: Segment,
    pub identity: Option<Identity>,
    pub request_id: RequestId,
}

/// The single normalized representation of an inbound event.
///
/// Created once per dispatch; each middleware stage may yield an updated
/// value that supersedes the prior one.
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub trigger: TriggerKind,
    /// The raw source event, retained for handlers that need
    /// trigger-specific fields the normalizer does not surface.
    pub raw: Value,
    pub method: Option<Method>,
    pub path: Option<String>,
    /// Best-effort parsed body; `{}` when absent or malformed.
    pub body: Value,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Header names lower-cased in one normalization pass.
    pub headers: HashMap<String, String>,
    pub context: RequestContext,
}

impl CanonicalRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }
}

/// HTTP verb of a gateway event (`httpMethod` for REST payloads,
/// `requestContext.http.method` for HTTP API v2 payloads).
#[must_use]
pub fn http_method(event: &Value) -> Option<Method> {
    let raw = event
        .get("httpMethod")
        .or_else(|| event.pointer("/requestContext/http/method"))
        .and_then(Value::as_str)?;
    raw.to_ascii_uppercase().parse().ok()
}

/// Concrete request path (`path` or `rawPath`).
#[must_use]
pub fn http_path(event: &Value) -> Option<String> {
    event
        .get("path")
        .or_else(|| event.get("rawPath"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Headers with names lower-cased; non-string values dropped.
#[must_use]
pub fn http_headers(event: &Value) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(obj) = event.get("headers").and_then(Value::as_object) {
        for (k, v) in obj {
            if let Some(v) = v.as_str() {
                headers.insert(k.to_ascii_lowercase(), v.to_string());
            }
        }
    }
    headers
}

/// Query parameters with multi-valued representations collapsed to a single
/// value (last wins) and null entries dropped.
#[must_use]
pub fn http_query_params(event: &Value) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(obj) = event
        .get("multiValueQueryStringParameters")
        .and_then(Value::as_object)
    {
        for (k, v) in obj {
            if let Some(last) = v.as_array().and_then(|a| a.last()).and_then(Value::as_str) {
                params.insert(k.clone(), last.to_string());
            }
        }
    }
    if let Some(obj) = event
        .get("queryStringParameters")
        .and_then(Value::as_object)
    {
        for (k, v) in obj {
            if let Some(v) = v.as_str() {
                params.insert(k.clone(), v.to_string());
            }
        }
    }
    params
}

/// Path parameters the gateway already extracted upstream, if any.
#[must_use]
pub fn upstream_path_params(event: &Value) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(obj) = event.get("pathParameters").and_then(Value::as_object) {
        for (k, v) in obj {
            if let Some(v) = v.as_str() {
                params.insert(k.clone(), v.to_string());
            }
        }
    }
    params
}

/// Best-effort decode of a gateway body: optionally base64-encoded, then
/// JSON-parsed. Absent, malformed, or non-JSON bodies all normalize to `{}`.
#[must_use]
pub fn http_body(event: &Value) -> Value {
    let Some(raw) = event.get("body").and_then(Value::as_str) else {
        return Value::Object(Map::new());
    };
    let decoded = if event
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        match general_purpose::STANDARD.decode(raw) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(_) => {
                    debug!("base64 body is not valid utf-8, normalizing to empty body");
                    return Value::Object(Map::new());
                }
            },
            Err(_) => {
                debug!("body flagged base64 but failed to decode, normalizing to empty body");
                return Value::Object(Map::new());
            }
        }
    } else {
        raw.to_string()
    };
    match serde_json::from_str(&decoded) {
        Ok(v) => v,
        Err(_) => {
            debug!("http body is not JSON, normalizing to empty body");
            Value::Object(Map::new())
        }
    }
}

/// One record of a queue batch after normalization.
#[derive(Debug, Clone)]
pub struct QueueRecord {
    /// Routing key: trailing segment of the source queue's resource
    /// identifier.
    pub source: String,
    /// Best-effort JSON decode of the record body; on failure the raw
    /// string is preserved under `rawBody`, never discarded.
    pub body: Value,
}

/// Split a queue batch into normalized records.
#[must_use]
pub fn queue_records(event: &Value) -> Vec<QueueRecord> {
    let Some(records) = event.get("Records").and_then(Value::as_array) else {
        return Vec::new();
    };
    records
        .iter()
        .map(|record| {
            let source = record
                .get("eventSourceARN")
                .and_then(Value::as_str)
                .and_then(|arn| arn.rsplit(':').next())
                .unwrap_or_default()
                .to_string();
            let body = record
                .get("body")
                .and_then(Value::as_str)
                .map(parse_body_lossy)
                .unwrap_or_else(|| Value::Object(Map::new()));
            QueueRecord { source, body }
        })
        .collect()
}

/// Routing key of an event-bus notification.
#[must_use]
pub fn event_bus_key(event: &Value) -> Option<&str> {
    event.get("detail-type").and_then(Value::as_str)
}

/// Opaque detail payload of an event-bus notification; `{}` when absent.
#[must_use]
pub fn event_bus_detail(event: &Value) -> Value {
    event
        .get("detail")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Queue record bodies only: a non-JSON body is preserved verbatim under
/// `rawBody` rather than discarded, since queue producers routinely enqueue
/// plain-text payloads a handler still wants to see.
fn parse_body_lossy(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            let mut map = Map::new();
            map.insert("rawBody".to_string(), Value::String(raw.to_string()));
            Value::Object(map)
        }
    }
}
