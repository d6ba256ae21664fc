//! Path pattern compilation and matching.
//!
//! Patterns are templates over `/`-separated segments where each segment is
//! either a literal or a `{name}` placeholder. Matching is always fully
//! anchored: a pattern never prefix-matches a longer path.

use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::error::RouteTableError;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 placeholders (e.g. `/orgs/{org}/users/{id}`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the resolve hot path.
///
/// Param names use `Arc<str>` because they come from the static route table
/// built at startup; `Arc::clone()` is an O(1) refcount bump instead of a
/// per-request string copy. Values are per-request data and stay `String`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Normalize a concrete path or pattern: enforce a leading slash and strip
/// any trailing slash, except for the root `/` itself.
///
/// Idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// A route pattern compiled once at table-build time.
///
/// Placeholders capture one-or-more characters excluding the separator
/// (`[^/]+`); literal segments are matched verbatim with special characters
/// escaped. Captures zip to parameter names in declaration order.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

impl PathPattern {
    /// Compile a pattern template. Fails on duplicate parameter names or
    /// malformed placeholder segments; never recompiled per request.
    pub fn compile(pattern: &str) -> Result<Self, RouteTableError> {
        let normalized = normalize_path(pattern);

        let mut regex_src = String::with_capacity(normalized.len() + 8);
        regex_src.push('^');
        let mut param_names: Vec<Arc<str>> = Vec::new();

        if normalized == "/" {
            regex_src.push('/');
        } else {
            for segment in normalized.split('/').skip(1) {
                regex_src.push('/');
                if let Some(name) = placeholder_name(segment) {
                    if name.is_empty() {
                        return Err(RouteTableError::InvalidPattern {
                            pattern: pattern.to_string(),
                            reason: "empty parameter name".to_string(),
                        });
                    }
                    if param_names.iter().any(|n| n.as_ref() == name) {
                        return Err(RouteTableError::DuplicateParam {
                            pattern: pattern.to_string(),
                            name: name.to_string(),
                        });
                    }
                    param_names.push(Arc::from(name));
                    regex_src.push_str("([^/]+)");
                } else if segment.contains('{') || segment.contains('}') {
                    return Err(RouteTableError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: format!("malformed placeholder segment `{segment}`"),
                    });
                } else {
                    regex_src.push_str(&regex::escape(segment));
                }
            }
        }
        regex_src.push('$');

        let regex = Regex::new(&regex_src).map_err(|e| RouteTableError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: normalized,
            regex,
            param_names,
        })
    }

    /// Match a concrete path against this pattern.
    ///
    /// The path is normalized first; a successful match yields exactly one
    /// entry per declared parameter, in declaration order. Returns `None`
    /// for anything short of a full-topology match.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let normalized = normalize_path(path);
        let caps = self.regex.captures(&normalized)?;
        let mut params = ParamVec::new();
        for (i, name) in self.param_names.iter().enumerate() {
            let value = caps.get(i + 1)?.as_str().to_string();
            params.push((Arc::clone(name), value));
        }
        Some(params)
    }

    /// The normalized pattern template this was compiled from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when the pattern has no placeholders. Literal patterns are tried
    /// before parametric ones within one segment+verb.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.param_names.is_empty()
    }

    /// Declared parameter names in order.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }
}

fn placeholder_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}
