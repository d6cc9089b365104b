//! Embedding gateway: text in, fixed-dimension vectors out.
//!
//! The gateway is the only contract the pipeline has with the embedding
//! model: order-preserving, one vector per input, dimension fixed for the
//! deployment. Any inability to produce vectors is a fatal error for the
//! unit in flight — the gateway never substitutes a zero vector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::RagError;

/// Default embedding dimension (all-MiniLM-L6-v2 family).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Text-to-vector boundary consumed by ingestion and retrieval.
///
/// Implementations must be deterministic for a fixed model version: repeated
/// calls on identical text are numerically close, not necessarily
/// bit-identical.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier for logs and telemetry.
    fn name(&self) -> &str;

    /// Output dimension, identical for every call.
    fn dimensions(&self) -> usize;

    /// Embeds `texts` in order, one vector per input.
    ///
    /// Errors with [`RagError::Embedding`] when the model is unavailable or
    /// returns a mismatched count or dimension.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

// ── HTTP inference provider ────────────────────────────────────────────

/// Embedding provider backed by an HTTP inference endpoint.
///
/// Sends `{ "model": ..., "input": [...] }` and accepts either the
/// `{"data": [{"embedding": [...], "index": n}]}` or the flat
/// `{"embeddings": [[...]]}` response shape.
///
/// The client performs no internal retry; retry policy belongs to the
/// caller.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, RagError> {
        let endpoint = Url::parse(endpoint).map_err(|err| RagError::Config {
            key: "embedding endpoint".into(),
            message: err.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(RagError::Config {
                key: "embedding endpoint".into(),
                message: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::Embedding(format!(
                "inference request failed ({status}): {body}"
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(format!("malformed inference response: {err}")))?;
        let vectors = payload.into_vectors(texts.len())?;

        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(RagError::Embedding(format!(
                    "model '{}' returned a {}-dimension vector, expected {}",
                    self.model,
                    vector.len(),
                    self.dimensions
                )));
            }
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbedResponse {
    fn into_vectors(self, expected: usize) -> Result<Vec<Vec<f32>>, RagError> {
        if !self.data.is_empty() {
            if self.data.len() != expected {
                return Err(RagError::Embedding(format!(
                    "model returned {} embeddings for {} inputs",
                    self.data.len(),
                    expected
                )));
            }
            let mut data = self.data;
            data.sort_by_key(|d| d.index.unwrap_or(0));
            return Ok(data.into_iter().map(|d| d.embedding).collect());
        }
        if !self.embeddings.is_empty() {
            if self.embeddings.len() != expected {
                return Err(RagError::Embedding(format!(
                    "model returned {} embeddings for {} inputs",
                    self.embeddings.len(),
                    expected
                )));
            }
            return Ok(self.embeddings);
        }
        Err(RagError::Embedding(
            "inference response carried no embedding payloads".to_string(),
        ))
    }
}

// ── Deterministic mock provider ────────────────────────────────────────

/// Deterministic embedding provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text: identical text always
/// yields an identical vector, distinct texts diverge.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a seed, xorshift64* stream. Stable across runs and platforms.
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            seed ^= u64::from(byte);
            seed = seed.wrapping_mul(0x0100_0000_01b3);
        }
        if seed == 0 {
            seed = 0x9e37_79b9_7f4a_7c15;
        }

        (0..self.dimensions)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let scaled = seed.wrapping_mul(0x2545_f491_4f6c_dd1d);
                // Map to [-1, 1].
                (scaled as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
