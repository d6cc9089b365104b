//! End-to-end tests for the ingestion and retrieval pipeline.
//!
//! These run against a real SQLite + sqlite-vec store in a temp directory,
//! driven by the deterministic mock embedding provider, so the full path —
//! normalize → chunk → embed → upsert → filtered search → context
//! expansion — is exercised without any external service.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ragvault::chunker::chunk_text;
use ragvault::embeddings::MockEmbeddingProvider;
use ragvault::ingestion::{DocumentSource, IngestionPipeline};
use ragvault::retrieval::{Retriever, build_context};
use ragvault::stores::{SearchFilter, SqliteChunkStore, VectorStore};
use ragvault::types::RagError;

const DIMS: usize = 32;

struct Stack {
    _dir: TempDir,
    store: Arc<SqliteChunkStore>,
    pipeline: IngestionPipeline,
    retriever: Retriever,
}

async fn stack(window: usize) -> Stack {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ragvault=debug")
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteChunkStore::open(dir.path().join("chunks.sqlite"), DIMS)
            .await
            .unwrap(),
    );
    let embedder = Arc::new(MockEmbeddingProvider::new().with_dimensions(DIMS));
    Stack {
        _dir: dir,
        store: store.clone(),
        pipeline: IngestionPipeline::new(embedder.clone(), store.clone()).with_window_size(window),
        retriever: Retriever::new(embedder, store),
    }
}

fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn document_of_450_tokens_becomes_three_uniform_chunks() {
    let stack = stack(200).await;

    let written = stack
        .pipeline
        .ingest_document(&words(450), "https://example.com/doc", &[], None)
        .await
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(stack.store.count().await.unwrap(), 3);

    let hits = stack
        .store
        .search(
            &vec![0.5; DIMS],
            10,
            Some(&SearchFilter::for_role("admin")),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);

    let indices: HashSet<u32> = hits.iter().map(|h| h.record.chunk_index).collect();
    assert_eq!(indices, HashSet::from([1, 2, 3]));

    let timestamps: HashSet<&str> = hits.iter().map(|h| h.record.last_updated.as_str()).collect();
    assert_eq!(timestamps.len(), 1);

    let ids: HashSet<&str> = hits.iter().map(|h| h.record.point_id.as_str()).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn reingestion_creates_new_points_instead_of_overwriting() {
    let stack = stack(200).await;
    let text = words(250);

    stack
        .pipeline
        .ingest_document(&text, "doc", &[], None)
        .await
        .unwrap();
    stack
        .pipeline
        .ingest_document(&text, "doc", &[], None)
        .await
        .unwrap();

    assert_eq!(stack.store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn retrieval_expands_the_top_hit_with_its_neighbors() {
    let stack = stack(30).await;

    let text = words(180); // 6 chunks of 30 tokens
    stack
        .pipeline
        .ingest_document(&text, "doc", &["analyst".to_string()], None)
        .await
        .unwrap();

    // Query with the exact text of chunk 4: the mock embedder maps
    // identical text to an identical vector, so chunk 4 is the top hit.
    let chunks: Vec<String> = chunk_text(&text, 30).collect();
    let query = chunks[3].clone();

    let result = stack.retriever.retrieve(&query, "analyst", 2).await.unwrap();

    let indices: Vec<u32> = result.iter().map(|c| c.record.chunk_index).collect();
    assert!(
        indices.windows(2).all(|w| w[0] < w[1]),
        "result must be in ascending reading order, got {indices:?}"
    );
    for expected in [3, 4, 5] {
        assert!(
            indices.contains(&expected),
            "chunk {expected} missing from expanded context {indices:?}"
        );
    }

    let ids: HashSet<&str> = result.iter().map(|c| c.record.point_id.as_str()).collect();
    assert_eq!(ids.len(), result.len(), "no duplicate points after expansion");

    let context = build_context(&result);
    assert!(context.contains(&chunks[3]));
    assert!(context.contains("\n\n---\n\n"));
}

#[tokio::test]
async fn roles_gate_both_search_and_retrieval() {
    let stack = stack(50).await;

    stack
        .pipeline
        .ingest_document(
            &words(60),
            "open-doc",
            &["analyst".to_string(), "admin".to_string()],
            None,
        )
        .await
        .unwrap();
    stack
        .pipeline
        .ingest_document(&words(60), "restricted-doc", &["manager".to_string()], None)
        .await
        .unwrap();

    let as_manager = stack
        .retriever
        .retrieve("w1 w2 w3", "manager", 10)
        .await
        .unwrap();
    assert!(as_manager.iter().all(|c| c.record.source == "restricted-doc"));
    assert!(as_manager.iter().all(|c| {
        c.record.allowed_roles.iter().any(|r| r == "manager")
    }));

    let as_intern = stack.retriever.retrieve("w1 w2 w3", "intern", 10).await;
    assert!(matches!(as_intern, Err(RagError::NoRelevantContent)));
}

#[tokio::test]
async fn empty_document_writes_nothing() {
    let stack = stack(200).await;
    let written = stack
        .pipeline
        .ingest_document("\n\t   ", "blank", &[], None)
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(stack.store.count().await.unwrap(), 0);
}

struct StubSource;

#[async_trait]
impl DocumentSource for StubSource {
    async fn fetch_text(&self, source: &str) -> Result<Option<String>, RagError> {
        match source {
            "a" => Ok(Some(words(70))),
            "b" => Ok(None),
            "c" => Ok(Some(words(40))),
            _ => Err(RagError::Acquisition {
                source: source.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[tokio::test]
async fn batch_shares_one_timestamp_and_survives_bad_documents() {
    let stack = stack(50).await;

    let sources = vec![
        "a".to_string(),
        "b".to_string(),
        "down".to_string(),
        "c".to_string(),
    ];
    let written = stack
        .pipeline
        .ingest_batch(&StubSource, &sources, &["analyst".to_string()])
        .await
        .unwrap();

    // "a" yields 2 chunks, "c" yields 1; "b" and "down" are skipped.
    assert_eq!(written, 3);
    assert_eq!(stack.store.count().await.unwrap(), 3);

    let hits = stack
        .store
        .search(
            &vec![0.1; DIMS],
            10,
            Some(&SearchFilter::for_role("analyst")),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);

    let timestamps: HashSet<&str> = hits.iter().map(|h| h.record.last_updated.as_str()).collect();
    assert_eq!(
        timestamps.len(),
        1,
        "all chunks of one batch share a single last_updated value"
    );

    let sources_seen: HashSet<&str> = hits.iter().map(|h| h.record.source.as_str()).collect();
    assert_eq!(sources_seen, HashSet::from(["a", "c"]));
}

#[tokio::test]
async fn point_ids_never_repeat_across_ingestions() {
    let stack = stack(50).await;

    stack
        .pipeline
        .ingest_document(&words(120), "first", &[], None)
        .await
        .unwrap();
    stack
        .pipeline
        .ingest_document(&words(120), "second", &[], None)
        .await
        .unwrap();

    let hits = stack
        .store
        .search(&vec![0.3; DIMS], 20, None)
        .await
        .unwrap();
    let ids: HashSet<&str> = hits.iter().map(|h| h.record.point_id.as_str()).collect();
    assert_eq!(ids.len(), hits.len());
    assert_eq!(hits.len(), 6);
}
