//! Ingestion orchestrator: normalize → chunk → embed → assemble → upsert.
//!
//! Each step is a hard gate. Empty normalization or chunking output is a
//! soft no-op for the document (logged, zero chunks written, no error);
//! embedding and store failures are fatal for the ingestion unit — one
//! document in single mode, the whole batch in batch mode.
//!
//! Every chunk produced within one ingestion unit shares a single
//! millisecond-precision timestamp, and every chunk gets a fresh uuid
//! `point_id`, so concurrent ingestions of different documents can never
//! collide in the store.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::{DEFAULT_WINDOW_SIZE, chunk_text};
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::source::DocumentSource;
use crate::normalize::normalize;
use crate::stores::{ChunkRecord, UploadMeta, VectorStore};
use crate::types::RagError;

/// Role granted when the caller supplies no `allowed_roles`.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Drives document text through the full ingestion path.
///
/// Constructed once at process start with its collaborators injected; the
/// store is the only shared mutable resource.
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    window_size: usize,
    default_roles: Vec<String>,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            window_size: DEFAULT_WINDOW_SIZE,
            default_roles: vec![DEFAULT_ADMIN_ROLE.to_string()],
        }
    }

    /// Overrides the chunking window size (tokens per chunk).
    #[must_use]
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// Overrides the roles granted when a caller supplies none.
    #[must_use]
    pub fn with_default_roles(mut self, default_roles: Vec<String>) -> Self {
        if !default_roles.is_empty() {
            self.default_roles = default_roles;
        }
        self
    }

    /// Ingests one document's extracted text.
    ///
    /// Returns the number of chunks written. `Ok(0)` signals a soft no-op
    /// (nothing extractable after normalization or chunking); only embedding
    /// and store failures surface as errors.
    pub async fn ingest_document(
        &self,
        raw_text: &str,
        source: &str,
        allowed_roles: &[String],
        upload: Option<UploadMeta>,
    ) -> Result<usize, RagError> {
        let last_updated = unit_timestamp();
        let records = self
            .prepare_document(raw_text, source, allowed_roles, upload, &last_updated)
            .await?;
        if records.is_empty() {
            return Ok(0);
        }

        let written = records.len();
        self.store.upsert(records).await?;
        info!(source, chunks = written, "document ingested");
        Ok(written)
    }

    /// Ingests a batch of documents sharing one role set and one timestamp.
    ///
    /// Acquisition/extraction failure of one document is isolated: it is
    /// logged and skipped without aborting the batch. All surviving chunk
    /// records are written in a single bulk upsert after the loop, so every
    /// batch member shares the same `last_updated` value. Returns the total
    /// chunk count written.
    pub async fn ingest_batch(
        &self,
        documents: &dyn DocumentSource,
        sources: &[String],
        allowed_roles: &[String],
    ) -> Result<usize, RagError> {
        if sources.is_empty() {
            return Ok(0);
        }

        let last_updated = unit_timestamp();
        let mut batch: Vec<ChunkRecord> = Vec::new();

        for (position, source) in sources.iter().enumerate() {
            let text = match documents.fetch_text(source).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    warn!(
                        source = %source,
                        position = position + 1,
                        total = sources.len(),
                        "document produced no text; skipping"
                    );
                    continue;
                }
                Err(err) => {
                    warn!(
                        source = %source,
                        position = position + 1,
                        total = sources.len(),
                        error = %err,
                        "document acquisition failed; skipping"
                    );
                    continue;
                }
            };

            let records = self
                .prepare_document(&text, source, allowed_roles, None, &last_updated)
                .await?;
            batch.extend(records);
        }

        if batch.is_empty() {
            warn!(total = sources.len(), "batch produced no chunks");
            return Ok(0);
        }

        let written = batch.len();
        self.store.upsert(batch).await?;
        info!(
            documents = sources.len(),
            chunks = written,
            "batch ingested"
        );
        Ok(written)
    }

    /// Normalizes, chunks, and embeds one document, assembling its records.
    ///
    /// An empty vec means the document had nothing to persist. Embedding
    /// failure propagates.
    async fn prepare_document(
        &self,
        raw_text: &str,
        source: &str,
        allowed_roles: &[String],
        upload: Option<UploadMeta>,
        last_updated: &str,
    ) -> Result<Vec<ChunkRecord>, RagError> {
        let normalized = normalize(raw_text);
        if normalized.is_empty() {
            warn!(source, "normalization produced no text; skipping document");
            return Ok(Vec::new());
        }

        let chunks: Vec<String> = chunk_text(&normalized, self.window_size).collect();
        if chunks.is_empty() {
            warn!(source, "chunking produced no windows; skipping document");
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "provider '{}' returned {} vectors for {} chunks",
                self.embedder.name(),
                vectors.len(),
                chunks.len()
            )));
        }

        let roles = if allowed_roles.is_empty() {
            self.default_roles.clone()
        } else {
            allowed_roles.to_vec()
        };
        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| ChunkRecord {
                point_id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                chunk_index: (i + 1) as u32,
                chunk,
                last_updated: last_updated.to_string(),
                allowed_roles: roles.clone(),
                upload: upload.clone(),
                vector: Some(vector),
            })
            .collect();
        Ok(records)
    }
}

/// Shared timestamp for one ingestion unit: ISO-8601, millisecond
/// precision, UTC.
fn unit_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
