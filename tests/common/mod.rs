//! Shared builders for integration tests: raw trigger events in the shapes
//! the upstream gateways produce, and counting handlers.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use triggermux::dispatcher::{handler_fn, Handler, HandlerResponse};

/// Initialize a default tracing subscriber for the duration of a test.
#[allow(dead_code)]
pub fn init_tracing() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Handler that counts invocations and echoes its body.
#[allow(dead_code)]
pub fn counting_handler(counter: Arc<AtomicUsize>) -> Arc<dyn Handler> {
    handler_fn(move |req| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            HandlerResponse::json(200, req.body)
        }
    })
}

/// REST-gateway HTTP event with optional Cognito authorizer claims.
#[allow(dead_code)]
pub fn http_event(method: &str, path: &str, claims: Option<Value>) -> Value {
    let mut event = json!({
        "httpMethod": method,
        "path": path,
        "headers": {},
    });
    if let Some(claims) = claims {
        event["requestContext"] = json!({ "authorizer": { "claims": claims } });
    }
    event
}

/// Claims for a user in `pool` with the given tenant attributes.
#[allow(dead_code)]
pub fn tenant_claims(pool: &str, tenant_id: &str) -> Value {
    json!({
        "sub": "user-1",
        "email": "user@example.com",
        "iss": format!("https://cognito-idp.eu-west-1.amazonaws.com/{pool}"),
        "custom:tenant_id": tenant_id,
        "custom:tenant_kind": "organization",
        "custom:owner_user_id": "user-1",
        "custom:country_code": "DE",
        "custom:features": "crm",
    })
}

/// Event-bus notification with a `detail-type` routing key.
#[allow(dead_code)]
pub fn event_bus_event(detail_type: &str, detail: Value) -> Value {
    json!({
        "source": "app.users",
        "detail-type": detail_type,
        "detail": detail,
    })
}

/// Queue batch with one record per (queue name, body) pair.
#[allow(dead_code)]
pub fn queue_event(records: &[(&str, &str)]) -> Value {
    let records: Vec<Value> = records
        .iter()
        .map(|(queue, body)| {
            json!({
                "eventSource": "aws:sqs",
                "eventSourceARN": format!("arn:aws:sqs:eu-west-1:123456789012:{queue}"),
                "body": body,
            })
        })
        .collect();
    json!({ "Records": records })
}

/// Unsigned bearer token whose payload is `claims`; the signature segment
/// is garbage on purpose.
#[allow(dead_code)]
pub fn bearer_token(claims: &Value) -> String {
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("eyJhbGciOiJub25lIn0.{payload}.unsigned")
}
