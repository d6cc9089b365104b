//! Storage backends for chunk records and their embedding vectors.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │      SQLite      │
//!                  │    sqlite-vec    │
//!                  └──────────────────┘
//! ```
//!
//! The store owns the collection's schema — fixed vector dimension, cosine
//! distance, secondary indexes on the filterable payload fields — and the
//! three operations the orchestrators need: batched [`upsert`],
//! role-filtered similarity [`search`], and exact metadata
//! [`lookup_exact`].
//!
//! [`upsert`]: VectorStore::upsert
//! [`search`]: VectorStore::search
//! [`lookup_exact`]: VectorStore::lookup_exact

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteChunkStore;

/// Display metadata carried by chunks that originate from uploaded files.
///
/// Absent for pure URL ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMeta {
    /// On-disk identifier of the stored file.
    pub file_in_storage: String,
    /// Human-readable original file name.
    pub display_name: String,
}

/// One stored chunk: the unit of embedding and retrieval.
///
/// Created exactly once at ingestion as part of a batch write, never
/// mutated. `point_id` is generated, never derived from content, and never
/// reused — re-ingestion creates new points rather than overwriting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Globally unique identifier, assigned at ingestion.
    pub point_id: String,
    /// Originating document: a URL or a stable path to a stored file.
    pub source: String,
    /// 1-based position within the source document; dense, no gaps.
    pub chunk_index: u32,
    /// Normalized text window.
    pub chunk: String,
    /// ISO-8601 timestamp (millisecond precision), shared by every chunk of
    /// one ingestion unit.
    pub last_updated: String,
    /// Roles permitted to retrieve this chunk. Non-empty.
    pub allowed_roles: Vec<String>,
    /// Upload display metadata, when the source is an uploaded file.
    pub upload: Option<UploadMeta>,
    /// Embedding vector. Required on write; read paths leave it unset.
    pub vector: Option<Vec<f32>>,
}

impl ChunkRecord {
    #[must_use]
    pub fn with_upload(mut self, upload: UploadMeta) -> Self {
        self.upload = Some(upload);
        self
    }

    #[must_use]
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }
}

/// A chunk returned by retrieval.
///
/// Direct similarity hits carry their score; chunks pulled in by context
/// expansion carry `None`.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: Option<f32>,
}

/// Structured filter for similarity search.
///
/// Currently a single predicate: the record's `allowed_roles` must contain
/// the given role.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    role: Option<String>,
}

impl SearchFilter {
    /// Filter requiring `allowed_roles` to contain `role`.
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Unified contract for chunk storage backends.
///
/// Transport failures are reported to the caller and never silently retried
/// inside the store; any retry policy belongs to the caller.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes `records` as one batch. The batch completes together
    /// (all-or-error); callers must not observe partial item-by-item
    /// success. Every record must carry a vector of the collection's
    /// dimension.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Returns up to `top_k` chunks ranked by descending similarity to
    /// `query_vector`, restricted to records matching `filter` when given.
    ///
    /// Ties in similarity are broken by a stable store-defined order;
    /// callers must not depend on sub-score ordering.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, RagError>;

    /// Returns the chunk(s) whose payload exactly matches `source` and
    /// `chunk_index` and whose `allowed_roles` contains `role`. At most one
    /// match is expected.
    async fn lookup_exact(
        &self,
        source: &str,
        chunk_index: u32,
        role: &str,
    ) -> Result<Vec<ChunkRecord>, RagError>;

    /// Total number of chunks in the collection.
    async fn count(&self) -> Result<usize, RagError>;
}
