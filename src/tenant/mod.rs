//! Multi-tenant data resolution and request-scoped propagation.
//!
//! [`TenantInfo`] is always recomputed per request from token claims or
//! trusted propagation headers; it is never authoritative state. The
//! [`context`] submodule holds the resolved value in a task-scoped slot so
//! any code in the request's async chain can read it without parameter
//! threading.

pub mod context;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Tenant classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantKind {
    Organization,
    Individual,
}

impl FromStr for TenantKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "organization" => Ok(TenantKind::Organization),
            "individual" => Ok(TenantKind::Individual),
            _ => Err(()),
        }
    }
}

/// Resolved multi-tenant data for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub tenant_id: String,
    pub kind: TenantKind,
    pub owner_user_id: String,
    pub country_code: String,
    pub plan: Option<String>,
    pub features: Vec<String>,
}

impl TenantInfo {
    /// Resolve tenant data from a claims object.
    ///
    /// Each logical field is accepted in a `custom:`-prefixed and a bare
    /// form; when both exist on one claims object the prefixed form wins.
    /// Yields `None` when tenant id, kind, owner, or country is missing, or
    /// the kind is unrecognized.
    #[must_use]
    pub fn from_claims(claims: &Value) -> Option<TenantInfo> {
        let tenant_id = claim_str(claims, "tenant_id")?;
        let kind = claim_str(claims, "tenant_kind")?.parse().ok()?;
        let owner_user_id = claim_str(claims, "owner_user_id")?;
        let country_code = claim_str(claims, "country_code")?;
        let plan = claim_str(claims, "plan");
        let features = claim_str(claims, "features")
            .map(|s| split_csv(&s))
            .unwrap_or_default();
        Some(TenantInfo {
            tenant_id,
            kind,
            owner_user_id,
            country_code,
            plan,
            features,
        })
    }

    /// Resolve tenant data from propagation headers set by a trusted
    /// upstream invocation. Header names are expected lower-cased (the
    /// normalizer guarantees this).
    #[must_use]
    pub fn from_headers(headers: &HashMap<String, String>) -> Option<TenantInfo> {
        let tenant_id = headers.get("x-tenant-id")?.clone();
        let kind = headers.get("x-tenant-kind")?.parse().ok()?;
        let owner_user_id = headers.get("x-tenant-owner")?.clone();
        let country_code = headers.get("x-tenant-country")?.clone();
        let plan = headers.get("x-tenant-plan").cloned();
        let features = headers
            .get("x-tenant-features")
            .map(|s| split_csv(s))
            .unwrap_or_default();
        Some(TenantInfo {
            tenant_id,
            kind,
            owner_user_id,
            country_code,
            plan,
            features,
        })
    }

    /// True when the tenant carries the named feature flag.
    #[must_use]
    pub fn has_feature(&self, flag: &str) -> bool {
        self.features.iter().any(|f| f == flag)
    }
}

/// Prefer the `custom:`-prefixed claim key over the bare one.
fn claim_str(claims: &Value, key: &str) -> Option<String> {
    claims
        .get(format!("custom:{key}"))
        .or_else(|| claims.get(key))
        .and_then(Value::as_str)
        .map(String::from)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}
