use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one request. Transport failures carry `error` and no status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub response_time: u64,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(status: u16, response_time: u64, headers: IndexMap<String, String>, body: Value) -> Self {
        Self {
            status_code: Some(status),
            response_time,
            headers,
            body,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, response_time: u64) -> Self {
        Self {
            response_time,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Status code as text, or `error` for transport failures.
    pub fn status_label(&self) -> String {
        self.status_code
            .map(|status| status.to_string())
            .unwrap_or_else(|| "error".to_string())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Decodes a response body: JSON when it parses, else UTF-8 text, else hex.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        return json;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::String(hex::encode(bytes)),
    }
}
