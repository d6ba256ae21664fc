use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Propagation header carrying an upstream dispatch id. Matched against
/// normalized (lower-cased) header names.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Strongly typed per-dispatch identifier backed by ULID.
///
/// Propagated through the canonical request context so log lines from deep
/// inside a handler's async chain correlate back to one trigger event, and
/// across service hops via [`REQUEST_ID_HEADER`].
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Resolve the dispatch id from normalized request headers: reuse the
    /// propagated value when it parses as a ULID, else mint a fresh one.
    /// An unparseable header is never an error; correlation degrades, the
    /// dispatch proceeds.
    #[must_use]
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RequestId(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagated_header_value_is_reused() {
        let upstream = RequestId::new();
        let mut headers = HashMap::new();
        headers.insert(REQUEST_ID_HEADER.to_string(), upstream.to_string());
        assert_eq!(RequestId::from_headers(&headers), upstream);
    }

    #[test]
    fn unparseable_or_absent_header_mints_fresh() {
        let mut headers = HashMap::new();
        headers.insert(REQUEST_ID_HEADER.to_string(), "not-a-ulid".to_string());
        assert!("not-a-ulid".parse::<RequestId>().is_err());
        // A fresh id is minted either way; never an error.
        let _ = RequestId::from_headers(&headers);
        let _ = RequestId::from_headers(&HashMap::new());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = RequestId::new();
        assert_eq!(id.to_string().parse::<RequestId>().ok(), Some(id));
    }
}
