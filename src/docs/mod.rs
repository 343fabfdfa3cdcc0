pub mod embed;
pub mod types;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::VectorStoreConfig;
use embed::EmbeddingClient;
use types::{IndexStats, QueryMatch, QueryResponse, UNKNOWN_SOURCE, UNKNOWN_TITLE};
pub use types::{DocumentChunk, SourceSummary};

/// Characters of chunk content kept in a cited source preview.
pub const PREVIEW_CHARS: usize = 200;

/// Pinecone stores the chunk text under this metadata key.
const TEXT_KEY: &str = "text";
const PINECONE_API_VERSION: &str = "2024-07";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vector store not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("vector store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vector store returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("embedding service returned an empty vector")]
    EmptyEmbedding,
}

/// Ranked document lookup.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, StoreError>;
}

/// Pinecone-backed document index, queried with Ollama embeddings.
pub struct VectorStore {
    client: reqwest::Client,
    index_url: String,
    api_key: String,
    namespace: String,
    embedder: EmbeddingClient,
}

impl VectorStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, StoreError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(StoreError::NotConfigured("PINECONE_API_KEY"))?;
        let host = config
            .index_host
            .as_deref()
            .ok_or(StoreError::NotConfigured("PINECONE_INDEX_HOST"))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let embedder = EmbeddingClient::new(
            client.clone(),
            &config.embedding_base_url,
            &config.embedding_model,
        );

        Ok(Self {
            client,
            index_url: index_url(host),
            api_key,
            namespace: config.namespace.clone(),
            embedder,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, StoreError> {
        let resp = self
            .client
            .post(format!("{}/{}", self.index_url, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Check the index is reachable. Returns the total vector count.
    pub async fn health(&self) -> Result<u64, StoreError> {
        let resp = self.post("describe_index_stats", &serde_json::json!({})).await?;
        let stats: IndexStats = resp.json().await?;
        Ok(stats.total_vector_count)
    }
}

#[async_trait]
impl Retriever for VectorStore {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, StoreError> {
        let vector = self.embedder.embed(query).await?;
        let body = serde_json::json!({
            "namespace": self.namespace,
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
        });
        let resp = self.post("query", &body).await?;
        let parsed: QueryResponse = resp.json().await?;

        let chunks: Vec<DocumentChunk> = parsed.matches.into_iter().map(chunk_from_match).collect();
        debug!(k, returned = chunks.len(), "vector query complete");
        Ok(chunks)
    }
}

/// Normalise an index host into a base URL without trailing slash.
fn index_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn chunk_from_match(m: QueryMatch) -> DocumentChunk {
    let metadata = m.metadata.unwrap_or_default();
    DocumentChunk {
        title: meta_str(&metadata, "title").unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        source: meta_str(&metadata, "source").unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        chunk: meta_u32(&metadata, "chunk").unwrap_or(0),
        total_chunks: meta_u32(&metadata, "totalChunks"),
        content: meta_str(&metadata, TEXT_KEY).unwrap_or_default(),
        score: m.score,
    }
}

fn meta_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Pinecone returns every number as a float.
fn meta_u32(metadata: &Map<String, Value>, key: &str) -> Option<u32> {
    metadata
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

/// Shape retrieved chunks into cited sources with a truncated preview.
pub fn format_sources(chunks: &[DocumentChunk]) -> Vec<SourceSummary> {
    chunks
        .iter()
        .map(|doc| SourceSummary {
            title: doc.title.clone(),
            source: doc.source.clone(),
            chunk: doc.chunk,
            content: preview(&doc.content, PREVIEW_CHARS),
        })
        .collect()
}

/// First `max_chars` characters of `text`, always followed by `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{}...", &text[..end])
}
