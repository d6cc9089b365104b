//! Role-filtered retrieval with adjacent-chunk context expansion.
//!
//! The retriever embeds the caller's query, runs a role-filtered top-k
//! similarity search, then surrounds the best hits with their neighboring
//! chunks so the generator sees coherent passages instead of isolated
//! windows. Only the two highest-similarity hits are expanded: expanding
//! every result would dilute the generator's input and multiply store
//! round-trips.
//!
//! The role filter applies to the neighbor lookups too — context expansion
//! must never leak a chunk the caller is not authorized to see, even when it
//! is adjacent to an authorized one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::stores::{ScoredChunk, SearchFilter, VectorStore};
use crate::types::RagError;

/// Default number of similarity hits requested from the store.
pub const DEFAULT_TOP_K: usize = 5;

/// Number of top hits whose neighbors are fetched.
const EXPANSION_SEEDS: usize = 2;

/// Separator between chunk texts in the generator's context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieval orchestrator.
///
/// Constructed once with its collaborators injected and shared read-only
/// across concurrent queries.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieves the role-filtered, context-expanded chunk list for `query`.
    ///
    /// The result is sorted by `(source, chunk_index)` ascending — a
    /// document-coherent reading order, deduplicated by point id. An empty
    /// search result yields [`RagError::NoRelevantContent`], the expected
    /// "nothing matches this query and role" outcome; transport and
    /// embedding failures surface as their own variants.
    pub async fn retrieve(
        &self,
        query: &str,
        role: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let query_vector = self
            .embedder
            .embed_batch(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RagError::Embedding("gateway returned no vector for the query".to_string())
            })?;

        let filter = SearchFilter::for_role(role);
        let hits = self
            .store
            .search(&query_vector, top_k, Some(&filter))
            .await?;
        if hits.is_empty() {
            return Err(RagError::NoRelevantContent);
        }
        debug!(role, hits = hits.len(), "similarity search complete");

        // Merge set keyed by point id: a chunk reachable both as a direct
        // hit and as someone's neighbor appears once.
        let mut merged: HashMap<String, ScoredChunk> = hits
            .iter()
            .map(|hit| (hit.record.point_id.clone(), hit.clone()))
            .collect();

        for seed in hits.iter().take(EXPANSION_SEEDS) {
            let source = &seed.record.source;
            for neighbor_index in neighbor_indices(seed.record.chunk_index) {
                let neighbors = self
                    .store
                    .lookup_exact(source, neighbor_index, role)
                    .await?;
                for record in neighbors {
                    debug!(
                        source = %source,
                        neighbor_index,
                        point_id = %record.point_id,
                        "context expansion added neighbor"
                    );
                    merged
                        .entry(record.point_id.clone())
                        .or_insert(ScoredChunk {
                            record,
                            score: None,
                        });
                }
            }
        }

        let mut context: Vec<ScoredChunk> = merged.into_values().collect();
        sort_reading_order(&mut context);
        Ok(context)
    }
}

/// Indices adjacent to `chunk_index`. Indices are 1-based, so the previous
/// neighbor exists only for indices above one.
fn neighbor_indices(chunk_index: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(2);
    if chunk_index > 1 {
        indices.push(chunk_index - 1);
    }
    indices.push(chunk_index + 1);
    indices
}

/// Sorts by `(source, chunk_index)` ascending. Idempotent.
fn sort_reading_order(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        (a.record.source.as_str(), a.record.chunk_index)
            .cmp(&(b.record.source.as_str(), b.record.chunk_index))
    });
}

/// Concatenates the chunk texts, in list order, into the context string
/// handed to the generator.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.record.chunk.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
