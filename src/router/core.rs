//! Route tables and resolution - hot path for trigger routing.
//!
//! A [`RouteTable`] is built once at startup and read-only thereafter. Flat,
//! segmented, and segmented-with-middleware table shapes all normalize into
//! the same internal representation (segment → verb → compiled pattern list)
//! so per-request resolution never sniffs configuration shapes.

use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::path::{ParamVec, PathPattern};
use crate::dispatcher::Handler;
use crate::error::RouteTableError;
use crate::middleware::Middleware;

/// Security classification of a route.
///
/// The segment decides whether per-segment issuer validation applies and
/// which middleware bundle runs. Non-HTTP triggers always dispatch under
/// [`Segment::Internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// No issuer validation, no segment middleware by default.
    Public,
    /// End-user authenticated routes.
    Protected,
    /// Service-to-service and non-HTTP trigger routes.
    Internal,
    /// Operator / back-office routes.
    Admin,
}

impl Segment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Public => "public",
            Segment::Protected => "protected",
            Segment::Internal => "internal",
            Segment::Admin => "admin",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered handler plus its per-route middleware list.
#[derive(Clone)]
pub struct RouteEntry {
    pub handler: Arc<dyn Handler>,
    pub middleware: Vec<Arc<dyn Middleware>>,
}

struct CompiledRoute {
    pattern: PathPattern,
    entry: RouteEntry,
}

struct SegmentTable {
    segment: Segment,
    verbs: HashMap<Method, Vec<CompiledRoute>>,
}

/// Result of resolving a (verb, path) pair or a routing key.
#[derive(Clone)]
pub struct RouteResolution {
    pub handler: Arc<dyn Handler>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub segment: Segment,
    /// Parameters extracted from the concrete path (empty for key routes).
    pub params: ParamVec,
    /// Normalized pattern (or key) that matched, for logging.
    pub pattern: String,
}

/// Immutable routing table: path routes partitioned into segments, plus key
/// routes for event-bus / queue triggers and an optional default handler
/// for unmatched keys and direct invocations.
pub struct RouteTable {
    segments: Vec<SegmentTable>,
    key_routes: HashMap<String, RouteEntry>,
    default_entry: Option<RouteEntry>,
}

impl RouteTable {
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Resolve an HTTP-style (verb, path) pair.
    ///
    /// Segments are probed in declaration-precedence order and the first
    /// segment with a matching (verb, pattern) wins; the search stops there
    /// even if a later segment would also match. Within one segment, literal
    /// patterns are tried before parametric ones for the same verb.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteResolution> {
        debug!(method = %method, path = %path, "route match attempt");
        for table in &self.segments {
            let Some(routes) = table.verbs.get(method) else {
                continue;
            };
            for route in routes {
                if let Some(params) = route.pattern.matches(path) {
                    info!(
                        method = %method,
                        path = %path,
                        pattern = %route.pattern.pattern(),
                        segment = %table.segment,
                        "route matched"
                    );
                    return Some(RouteResolution {
                        handler: Arc::clone(&route.entry.handler),
                        middleware: route.entry.middleware.clone(),
                        segment: table.segment,
                        params,
                        pattern: route.pattern.pattern().to_string(),
                    });
                }
            }
        }
        warn!(method = %method, path = %path, "no route matched");
        None
    }

    /// Resolve an event-bus operation name or queue source key. Unmatched
    /// keys fall back to the default handler when one is registered.
    #[must_use]
    pub fn resolve_key(&self, key: &str) -> Option<RouteResolution> {
        let entry = match self.key_routes.get(key) {
            Some(entry) => entry,
            None => {
                debug!(key = %key, "no key route, trying default handler");
                self.default_entry.as_ref()?
            }
        };
        Some(RouteResolution {
            handler: Arc::clone(&entry.handler),
            middleware: entry.middleware.clone(),
            segment: Segment::Internal,
            params: ParamVec::new(),
            pattern: key.to_string(),
        })
    }

    /// Resolution for direct invocations: the default handler only, no
    /// sub-routing.
    #[must_use]
    pub fn resolve_default(&self) -> Option<RouteResolution> {
        let entry = self.default_entry.as_ref()?;
        Some(RouteResolution {
            handler: Arc::clone(&entry.handler),
            middleware: entry.middleware.clone(),
            segment: Segment::Internal,
            params: ParamVec::new(),
            pattern: "<default>".to_string(),
        })
    }
}

/// Builder collecting route declarations before the one-time compile.
///
/// A builder that never calls [`segment`](Self::segment) produces a flat
/// table: every route lands in [`Segment::Public`] with no middleware.
/// Segment precedence is the order in which segments first appear.
pub struct RouteTableBuilder {
    segments: Vec<(Segment, Vec<PendingRoute>)>,
    current: usize,
    key_routes: HashMap<String, RouteEntry>,
    default_entry: Option<RouteEntry>,
}

struct PendingRoute {
    method: Method,
    pattern: String,
    entry: RouteEntry,
}

impl RouteTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: vec![(Segment::Public, Vec::new())],
            current: 0,
            key_routes: HashMap::new(),
            default_entry: None,
        }
    }

    /// Switch the declaration cursor to `segment`, creating it at the next
    /// precedence position if it has not appeared yet.
    #[must_use]
    pub fn segment(mut self, segment: Segment) -> Self {
        match self.segments.iter().position(|(s, _)| *s == segment) {
            Some(idx) => self.current = idx,
            None => {
                self.segments.push((segment, Vec::new()));
                self.current = self.segments.len() - 1;
            }
        }
        self
    }

    /// Register a route in the current segment with no per-route middleware.
    #[must_use]
    pub fn route(self, method: Method, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.route_with(method, pattern, handler, Vec::new())
    }

    /// Register a route in the current segment with a per-route middleware
    /// list, run after global and segment middleware.
    #[must_use]
    pub fn route_with(
        mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn Handler>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        self.segments[self.current].1.push(PendingRoute {
            method,
            pattern: pattern.to_string(),
            entry: RouteEntry { handler, middleware },
        });
        self
    }

    /// Register a handler for an event-bus operation name or queue source
    /// key.
    #[must_use]
    pub fn key_route(mut self, key: &str, handler: Arc<dyn Handler>) -> Self {
        self.key_routes.insert(
            key.to_string(),
            RouteEntry {
                handler,
                middleware: Vec::new(),
            },
        );
        self
    }

    /// Register the fallback handler for unmatched keys and direct
    /// invocations.
    #[must_use]
    pub fn default_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.default_entry = Some(RouteEntry {
            handler,
            middleware: Vec::new(),
        });
        self
    }

    /// Compile every pattern and freeze the table.
    ///
    /// Within one segment+verb, literal patterns are stably ordered before
    /// parametric ones; declaration order is preserved otherwise. A (verb,
    /// pattern) pair registered in two segments is logged, not rejected:
    /// the earlier-precedence segment always wins at resolve time.
    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        let mut seen: Vec<(Method, String, Segment)> = Vec::new();
        let mut segments = Vec::with_capacity(self.segments.len());
        let mut route_count = 0usize;

        for (segment, pending) in self.segments {
            let mut verbs: HashMap<Method, Vec<CompiledRoute>> = HashMap::new();
            for route in pending {
                let pattern = PathPattern::compile(&route.pattern)?;
                if let Some((_, _, earlier)) = seen
                    .iter()
                    .find(|(m, p, _)| *m == route.method && p == pattern.pattern())
                {
                    warn!(
                        method = %route.method,
                        pattern = %pattern.pattern(),
                        winning_segment = %earlier,
                        shadowed_segment = %segment,
                        "duplicate route registration; earlier segment takes precedence"
                    );
                }
                seen.push((route.method.clone(), pattern.pattern().to_string(), segment));
                verbs.entry(route.method).or_default().push(CompiledRoute {
                    pattern,
                    entry: route.entry,
                });
                route_count += 1;
            }
            for routes in verbs.values_mut() {
                // Stable: declaration order survives inside each class.
                routes.sort_by_key(|r| !r.pattern.is_literal());
            }
            segments.push(SegmentTable { segment, verbs });
        }

        info!(
            routes_count = route_count,
            key_routes_count = self.key_routes.len(),
            has_default = self.default_entry.is_some(),
            segments = ?segments.iter().map(|s| s.segment.as_str()).collect::<Vec<_>>(),
            "routing table built"
        );

        Ok(RouteTable {
            segments,
            key_routes: self.key_routes,
            default_entry: self.default_entry,
        })
    }
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
