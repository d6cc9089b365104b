//! Crate-wide error taxonomy.
//!
//! The split mirrors how failures propagate through the pipeline:
//!
//! * [`RagError::Acquisition`] — a document never became usable text. Soft:
//!   absorbed (logged, counted) at the orchestrator boundary.
//! * [`RagError::Embedding`] — the embedding service could not produce
//!   vectors. Fatal for the ingestion unit or query currently in flight.
//! * [`RagError::Storage`] — vector-store transport or write failure. Fatal,
//!   never retried inside the store; carries the collection and operation so
//!   the caller can decide on retry.
//! * [`RagError::NoRelevantContent`] — retrieval matched nothing for the
//!   query and role. An expected outcome, not a system fault.

#[derive(Debug)]
pub enum RagError {
    /// Document acquisition or extraction failed; the document is skipped.
    Acquisition { source: String, reason: String },

    /// The embedding gateway could not produce vectors for the current unit.
    Embedding(String),

    /// Vector store transport or write failure.
    Storage {
        collection: String,
        operation: String,
        reason: String,
    },

    /// The query and role matched no stored chunks.
    NoRelevantContent,

    /// A configuration value is missing or malformed.
    Config { key: String, message: String },

    Io(String),
}

impl std::fmt::Display for RagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RagError::Acquisition { source, reason } => {
                write!(f, "acquisition failed for '{source}': {reason}")
            }
            RagError::Embedding(msg) => write!(f, "embedding failed: {msg}"),
            RagError::Storage {
                collection,
                operation,
                reason,
            } => write!(f, "vector store {operation} failed on '{collection}': {reason}"),
            RagError::NoRelevantContent => {
                write!(f, "no relevant content found for the query and role")
            }
            RagError::Config { key, message } => {
                write!(f, "invalid configuration for {key}: {message}")
            }
            RagError::Io(msg) => write!(f, "i/o error: {msg}"),
        }
    }
}

impl std::error::Error for RagError {}

impl RagError {
    /// `true` when the error is the expected empty-retrieval outcome rather
    /// than a system fault.
    pub fn is_no_relevant_content(&self) -> bool {
        matches!(self, RagError::NoRelevantContent)
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}
