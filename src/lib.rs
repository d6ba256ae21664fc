//! # triggermux
//!
//! **triggermux** dispatches serverless trigger events to handlers. One
//! process receives heterogeneous events (HTTP gateway calls, message-queue
//! batches, event-bus notifications, direct invocations) and each must
//! route to exactly one handler, pass a per-route security classification,
//! and carry request-scoped identity and tenant data through arbitrarily
//! deep async call chains without explicit parameter threading.
//!
//! ## Architecture
//!
//! - **[`router`]**: segmented path routing with `{name}` parameter
//!   extraction, plus key routing for event-bus and queue triggers
//! - **[`event`]**: structural trigger detection and normalization into one
//!   canonical request envelope
//! - **[`identity`]**: principal extraction from upstream-authorizer
//!   payloads and issuer/group predicates
//! - **[`tenant`]**: per-request tenant resolution and the task-scoped
//!   context store
//! - **[`middleware`]**: ordered global, segment, and route pipeline with
//!   short-circuiting, and the standard tenant/feature guards
//! - **[`dispatcher`]**: orchestration from detection through the pipeline
//!   to the decorated result
//! - **[`config`]**: per-segment issuers, CORS policy, denial overrides
//!
//! ## Quick start
//!
//! ```no_run
//! use http::Method;
//! use serde_json::json;
//! use triggermux::dispatcher::{handler_fn, Dispatcher, HandlerResponse};
//! use triggermux::router::RouteTable;
//!
//! # async fn example() -> Result<(), triggermux::error::RouteTableError> {
//! let get_user = handler_fn(|req| async move {
//!     let id = req.path_param("id").unwrap_or("").to_string();
//!     HandlerResponse::json(200, json!({ "id": id }))
//! });
//!
//! let table = RouteTable::builder()
//!     .route(Method::GET, "/users/{id}", get_user)
//!     .build()?;
//!
//! let dispatcher = Dispatcher::new(table);
//! let result = dispatcher
//!     .dispatch(json!({ "httpMethod": "GET", "path": "/users/42" }))
//!     .await;
//! assert_eq!(result.status, 200);
//! # Ok(())
//! # }
//! ```
//!
//! ## Scope
//!
//! triggermux is not a network listener, TLS terminator, or persistent
//! store, and it performs no background scheduling. Token signature
//! verification is assumed done upstream; the optional unverified claim
//! fallback is disabled by default.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod identity;
pub mod ids;
pub mod middleware;
pub mod router;
pub mod tenant;

pub use config::{CorsConfig, DispatcherConfig};
pub use dispatcher::{handler_fn, Dispatcher, Handler, HandlerResponse};
pub use event::{CanonicalRequest, RequestContext, TriggerKind};
pub use identity::Identity;
pub use router::{RouteTable, Segment};
pub use tenant::{TenantInfo, TenantKind};
