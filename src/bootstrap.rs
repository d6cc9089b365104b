//! Composition boundary: store connection with bounded retry, and one-shot
//! wiring of the ingestion/retrieval stack.
//!
//! The core never retries anything internally; connection retry lives here,
//! explicit and bounded, with a hard failure once the bound is exhausted.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::Settings;
use crate::embeddings::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::ingestion::IngestionPipeline;
use crate::retrieval::Retriever;
use crate::stores::SqliteChunkStore;
use crate::types::RagError;

/// Bounded exponential backoff for the initial store connection.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.initial_backoff * (1u32 << capped)
    }
}

/// Opens the chunk store, retrying transient failures up to the policy's
/// bound. The last error is returned once the bound is exhausted.
pub async fn connect_store(
    settings: &Settings,
    policy: &RetryPolicy,
) -> Result<SqliteChunkStore, RagError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match SqliteChunkStore::open(&settings.db_path, settings.embedding_dimensions).await {
            Ok(store) => return Ok(store),
            Err(err) if attempt + 1 < attempts => {
                attempt += 1;
                let backoff = policy.backoff(attempt);
                warn!(
                    error = %err,
                    attempt,
                    max_attempts = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "vector store connection failed; retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// The wired ingestion/retrieval stack.
///
/// Built once at process start; the embedding provider and store are shared
/// between the pipeline and the retriever.
pub struct RagRuntime {
    pub pipeline: IngestionPipeline,
    pub retriever: Retriever,
}

/// Wires an HTTP embedding provider and the SQLite store into a runtime.
pub async fn build_runtime(settings: &Settings) -> Result<RagRuntime, RagError> {
    let store = Arc::new(connect_store(settings, &RetryPolicy::default()).await?);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        &settings.embedding_endpoint,
        settings.embedding_model.clone(),
        settings.embedding_dimensions,
    )?);

    Ok(RagRuntime {
        pipeline: IngestionPipeline::new(embedder.clone(), store.clone())
            .with_window_size(settings.chunk_window)
            .with_default_roles(vec![settings.default_role.clone()]),
        retriever: Retriever::new(embedder, store),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(3200));
        assert_eq!(policy.backoff(9), policy.backoff(5));
    }

    #[tokio::test]
    async fn connect_store_succeeds_first_try_on_a_writable_path() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            db_path: dir
                .path()
                .join("store.sqlite")
                .to_string_lossy()
                .into_owned(),
            embedding_dimensions: 4,
            ..Settings::default()
        };
        let store = connect_store(&settings, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(store.dimensions(), 4);
    }
}
