use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// One retrieval unit returned by the vector index, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub title: String,
    /// Source file the chunk was cut from, e.g. `litepaper.md`.
    pub source: String,
    /// 1-based position within the source; 0 when the index has no chunk metadata.
    pub chunk: u32,
    pub total_chunks: Option<u32>,
    pub content: String,
    pub score: f32,
}

/// Cited source as returned to callers: metadata plus a short preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub title: String,
    pub source: String,
    pub chunk: u32,
    pub content: String,
}

/// Index match as returned by the Pinecone `/query` endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryMatch {
    #[allow(dead_code)]
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexStats {
    #[serde(default)]
    pub total_vector_count: u64,
}
