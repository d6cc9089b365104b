//! Ingestion: turning extracted document text into persisted chunk records.
//!
//! * [`source`] — the acquisition/extraction boundary the pipeline consumes.
//! * [`pipeline`] — the orchestrator driving normalize → chunk → embed →
//!   assemble → batch upsert, for single documents and batches.

pub mod pipeline;
pub mod source;

pub use pipeline::{DEFAULT_ADMIN_ROLE, IngestionPipeline};
pub use source::DocumentSource;
