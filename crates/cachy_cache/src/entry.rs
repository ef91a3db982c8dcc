use std::collections::BTreeMap;

use bytes::Bytes;
use cachy_http::{X_CACHE, headers::is_hop_by_hop};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};

use crate::EntryError;

/// What gets stored under a cache key.
///
/// Serialized as a JSON object `{"status", "headers", "body"}` with the body
/// base64-encoded. Every writer uses this shape; nothing else is ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(with = "body_base64")]
    pub body: Bytes,
}

fn default_status() -> u16 {
    200
}

impl CachedEntry {
    /// Captures an origin response. Multi-valued headers are joined with
    /// `", "`. Hop-by-hop headers, `X-Cache`, `Content-Length` (recomputed
    /// from the body on replay) and non-UTF-8 values are dropped.
    ///
    /// Cookie replay is lossy: several `Set-Cookie` values come back as one
    /// comma-joined value on a hit, which breaks cookies whose `Expires`
    /// dates contain commas.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let mut stored = BTreeMap::new();

        for name in headers.keys() {
            if is_hop_by_hop(name) || *name == X_CACHE || *name == header::CONTENT_LENGTH {
                continue;
            }

            let values: Vec<&str> = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            if values.is_empty() {
                continue;
            }

            stored.insert(name.as_str().to_string(), values.join(", "));
        }

        Self {
            status: status.as_u16(),
            headers: stored,
            body,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK)
    }

    /// Rebuilds a header map for replay, skipping anything that no longer parses.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.insert(name, value);
            }
        }
        map
    }

    pub fn encode(&self) -> Result<Vec<u8>, EntryError> {
        serde_json::to_vec(self).map_err(EntryError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EntryError> {
        serde_json::from_slice(bytes).map_err(EntryError::Decode)
    }
}

mod body_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}
