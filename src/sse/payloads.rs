//! Payload deserialization structs
//!
//! Internal structs for the JSON carried on `data:` lines. Field names
//! follow the backend's snake_case wire format.

use serde::{Deserialize, Deserializer};

/// `token` payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenPayload {
    pub content: String,
}

/// `classification` payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClassificationPayload {
    pub classification: String,
    #[serde(default)]
    pub is_relevant: Option<bool>,
}

/// `sources` payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourcesPayload {
    pub sources: Vec<SourcePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourcePayload {
    pub content: String,
    #[serde(default)]
    pub metadata: SourceMetadataPayload,
    #[serde(default)]
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SourceMetadataPayload {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub chunk_index: Option<i64>,
}

/// `done` payload; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DonePayload {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// `error` payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(alias = "message")]
    pub error: String,
}

/// Page and chunk numbers come from document loaders as ints, floats or
/// strings depending on the file type. Anything unusable becomes `None`.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
