//! Common data types used across the capture subsystem.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::configuration::types::CaptureFlags;

/// One observed request/response exchange through the proxy.
///
/// Produced exactly once per completed proxied exchange and immutable after
/// creation; ownership transfers from the proxy to the sink on emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Distinct identifier for this sample within the capture.
    pub sample_id: Uuid,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CapturedBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CapturedBody>,
}

/// Body payload recorded at the configured capture depth.
///
/// Any combination of the three representations may be present depending on
/// the session's [`CaptureFlags`] and whether the payload parsed as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_hash: Option<String>,
}

impl CapturedBody {
    /// Builds the recorded form of a raw payload, honoring the capture flags.
    ///
    /// Returns `None` for empty payloads and when every capture depth is
    /// disabled (headers-only capture).
    pub fn from_raw(raw: &[u8], content_type: Option<&str>, flags: &CaptureFlags) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        if !flags.include_text_body && !flags.include_json_body && !flags.include_shape_hash {
            return None;
        }

        let parsed: Option<serde_json::Value> = serde_json::from_slice(raw).ok();

        let text = if flags.include_text_body {
            Some(String::from_utf8_lossy(raw).into_owned())
        } else {
            None
        };
        let json = if flags.include_json_body {
            parsed.clone()
        } else {
            None
        };
        let shape_hash = if flags.include_shape_hash {
            parsed.as_ref().map(shape_hash)
        } else {
            None
        };

        if text.is_none() && json.is_none() && shape_hash.is_none() {
            return None;
        }
        Some(Self {
            content_type: content_type.map(|s| s.to_string()),
            text,
            json,
            shape_hash,
        })
    }
}

/// Summary counters for a finished or in-progress capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub interactions_count: u64,
    pub diffs_count: u64,
}

/// Deterministic structural digest of a JSON value.
///
/// Hashes types and sorted field names while ignoring scalar values, so two
/// payloads with the same shape produce the same digest.
pub fn shape_hash(value: &serde_json::Value) -> String {
    let mut hasher = DefaultHasher::new();
    hash_shape(value, &mut hasher);
    format!("{:016x}", hasher.finish())
}

fn hash_shape(value: &serde_json::Value, hasher: &mut DefaultHasher) {
    match value {
        serde_json::Value::Null => "null".hash(hasher),
        serde_json::Value::Bool(_) => "bool".hash(hasher),
        serde_json::Value::Number(_) => "number".hash(hasher),
        serde_json::Value::String(_) => "string".hash(hasher),
        serde_json::Value::Array(items) => {
            "array".hash(hasher);
            for item in items {
                hash_shape(item, hasher);
            }
        }
        serde_json::Value::Object(fields) => {
            "object".hash(hasher);
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            for key in keys {
                key.hash(hasher);
                hash_shape(&fields[key.as_str()], hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_hash_ignores_values() {
        let a: serde_json::Value = serde_json::json!({"id": 1, "name": "alice"});
        let b: serde_json::Value = serde_json::json!({"name": "bob", "id": 99});
        assert_eq!(shape_hash(&a), shape_hash(&b));
    }

    #[test]
    fn shape_hash_distinguishes_shapes() {
        let a: serde_json::Value = serde_json::json!({"id": 1});
        let b: serde_json::Value = serde_json::json!({"id": "1"});
        assert_ne!(shape_hash(&a), shape_hash(&b));
    }

    #[test]
    fn body_respects_headers_only_capture() {
        let flags = CaptureFlags {
            include_text_body: false,
            include_json_body: false,
            include_shape_hash: false,
        };
        assert!(CapturedBody::from_raw(b"{\"a\":1}", Some("application/json"), &flags).is_none());
    }

    #[test]
    fn body_shape_hash_only() {
        let flags = CaptureFlags {
            include_text_body: false,
            include_json_body: false,
            include_shape_hash: true,
        };
        let body = CapturedBody::from_raw(b"{\"a\":1}", Some("application/json"), &flags).unwrap();
        assert!(body.text.is_none());
        assert!(body.json.is_none());
        assert!(body.shape_hash.is_some());
    }

    #[test]
    fn non_json_body_keeps_text() {
        let flags = CaptureFlags::default();
        let body = CapturedBody::from_raw(b"plain text", Some("text/plain"), &flags).unwrap();
        assert_eq!(body.text.as_deref(), Some("plain text"));
        assert!(body.json.is_none());
        assert!(body.shape_hash.is_none());
    }

    #[test]
    fn empty_body_is_absent() {
        let flags = CaptureFlags::default();
        assert!(CapturedBody::from_raw(b"", None, &flags).is_none());
    }
}
