//! Principal extraction from upstream-authorizer payloads.
//!
//! Gateways attach the authenticated principal in one of several shapes
//! depending on the authorizer type. [`Identity::extract`] probes the
//! recognized shapes in a fixed priority order and accepts the first
//! structurally plausible one. Signature verification is an upstream
//! concern: by the time an event reaches the dispatcher its token has
//! either been verified by the gateway or the deployment has explicitly
//! opted into the unverified header fallback.

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::{debug, warn};

/// Claim keys whose presence marks an authorizer payload as an identity.
const IDENTITY_KEYS: &[&str] = &["sub", "userId", "principalId", "email", "cognito:username"];

/// Authenticated principal descriptor derived from the trigger event.
///
/// Absent entirely (the extractor returns `None`) when no authenticated
/// principal exists; absence of data is never treated as permissive by the
/// predicates below.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    /// Normalized group list: trimmed, empty entries dropped, order kept.
    pub groups: Vec<String>,
    /// Token issuer URL, when the claims carried one.
    pub issuer: Option<String>,
    /// The raw claims object the identity was derived from.
    pub claims: Value,
}

impl Identity {
    /// Derive an identity from a raw trigger event.
    ///
    /// Probes, in priority order: `requestContext.authorizer.claims`
    /// (REST-gateway JWT authorizer), `requestContext.authorizer.jwt.claims`
    /// (HTTP API v2), the flat `requestContext.authorizer` object itself
    /// (custom authorizer), and `requestContext.authorizer.lambda`. The
    /// first shape carrying at least one recognized identity key wins.
    ///
    /// When no shape matches and `auto_extract` is true, falls back to an
    /// **unverified** decode of the bearer token's payload segment, purely
    /// for claim extraction. The flag must stay disabled unless the caller
    /// accepts tokens whose signatures were never checked.
    #[must_use]
    pub fn extract(event: &Value, auto_extract: bool) -> Option<Identity> {
        let shapes = [
            "/requestContext/authorizer/claims",
            "/requestContext/authorizer/jwt/claims",
            "/requestContext/authorizer",
            "/requestContext/authorizer/lambda",
        ];
        for pointer in shapes {
            if let Some(claims) = event.pointer(pointer) {
                if is_plausible_identity(claims) {
                    debug!(shape = pointer, "authorizer payload accepted");
                    return Self::from_claims(claims);
                }
            }
        }
        if auto_extract {
            if let Some(claims) = decode_bearer_claims(event) {
                if is_plausible_identity(&claims) {
                    warn!("identity derived from unverified bearer token payload");
                    return Self::from_claims(&claims);
                }
            }
        }
        None
    }

    /// Build an identity from a bare claims object.
    pub(crate) fn from_claims(claims: &Value) -> Option<Identity> {
        let user_id = ["sub", "userId", "principalId"]
            .iter()
            .find_map(|k| claims.get(*k).and_then(Value::as_str))?
            .to_string();
        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .map(String::from);
        let groups = claims
            .get("cognito:groups")
            .or_else(|| claims.get("groups"))
            .map(normalize_groups)
            .unwrap_or_default();
        let issuer = claims
            .get("iss")
            .and_then(Value::as_str)
            .map(String::from);
        Some(Identity {
            user_id,
            email,
            groups,
            issuer,
            claims: claims.clone(),
        })
    }

    /// Compare the trailing path segment of the issuer URL against the
    /// expected pool id. False, never a panic, when the issuer is absent.
    #[must_use]
    pub fn validate_issuer(&self, expected_pool_id: &str) -> bool {
        let Some(issuer) = self.issuer.as_deref() else {
            debug!("issuer validation failed: identity has no issuer claim");
            return false;
        };
        let tail = issuer.trim_end_matches('/').rsplit('/').next();
        let ok = tail == Some(expected_pool_id);
        if !ok {
            warn!(
                issuer = %issuer,
                expected = %expected_pool_id,
                "issuer validation failed: pool id mismatch"
            );
        }
        ok
    }

    /// True when the identity holds at least one of `required`. False on an
    /// empty group list or an empty requirement set.
    #[must_use]
    pub fn has_any_group(&self, required: &[&str]) -> bool {
        if self.groups.is_empty() || required.is_empty() {
            return false;
        }
        required.iter().any(|r| self.groups.iter().any(|g| g == r))
    }

    /// True when the identity holds every one of `required`. False on an
    /// empty group list.
    #[must_use]
    pub fn has_all_groups(&self, required: &[&str]) -> bool {
        if self.groups.is_empty() {
            return false;
        }
        required.iter().all(|r| self.groups.iter().any(|g| g == r))
    }
}

/// Group claims arrive as a JSON array or a comma-separated string; both
/// normalize to a trimmed, empty-entry-free list in original order.
fn normalize_groups(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn is_plausible_identity(claims: &Value) -> bool {
    claims
        .as_object()
        .is_some_and(|obj| IDENTITY_KEYS.iter().any(|k| obj.contains_key(*k)))
}

/// Unverified decode of a bearer token's middle segment. No signature
/// inspection whatsoever; claims only.
fn decode_bearer_claims(event: &Value) -> Option<Value> {
    let token = event
        .pointer("/headers/authorization")
        .or_else(|| event.pointer("/headers/Authorization"))
        .and_then(Value::as_str)?
        .strip_prefix("Bearer ")?;
    let payload = token.split('.').nth(1)?;
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD.decode(payload))
        .ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("bearer payload decode failed: invalid JSON - {e:?}");
            None
        }
    }
}
