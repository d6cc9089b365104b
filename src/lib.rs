//! Role-filtered ingestion and context-expanded retrieval for RAG pipelines.
//!
//! ```text
//! Extracted text ──► normalize ──► chunker ──► embeddings ──┐
//!                                                           │
//!                     ingestion::IngestionPipeline ─────────┴─► ChunkRecord batch
//!                                                                     │
//!                                                                     ▼
//!                                                        stores::SqliteChunkStore
//!                                                                     │
//! Query ──► embeddings ──► filtered top-k ──► neighbor expansion ─────┘
//!                                │
//!                     retrieval::Retriever ──► ordered, role-safe context
//! ```
//!
//! Every chunk is persisted with the set of roles allowed to retrieve it; the
//! retrieval path filters both the similarity search and the adjacent-chunk
//! context expansion by the caller's role. A query matching nothing for a
//! role surfaces as [`types::RagError::NoRelevantContent`], a first-class
//! outcome distinct from transport failures.

pub mod bootstrap;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod normalize;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chunker::{DEFAULT_WINDOW_SIZE, chunk_text};
pub use embeddings::{
    DEFAULT_DIMENSIONS, EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider,
};
pub use ingestion::{DocumentSource, IngestionPipeline};
pub use normalize::normalize;
pub use retrieval::{DEFAULT_TOP_K, Retriever, build_context};
pub use stores::{ChunkRecord, ScoredChunk, SearchFilter, UploadMeta, VectorStore};
pub use types::RagError;
