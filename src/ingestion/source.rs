//! Document acquisition/extraction boundary.
//!
//! Downloading bytes, rendering HTML to PDF, and extracting raw text all
//! live outside this crate. The pipeline consumes only the combined result:
//! either the document's extracted text, or the fact that it never became
//! usable.

use async_trait::async_trait;

use crate::types::RagError;

/// Resolves a source identifier (URL or stored-file path) into extracted
/// text.
///
/// `Ok(None)` means the document never became usable text — download
/// failure already handled upstream, empty extraction, unsupported format.
/// Batch ingestion treats both `Ok(None)` and `Err` as per-document soft
/// failures: logged and skipped without aborting the batch.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_text(&self, source: &str) -> Result<Option<String>, RagError>;
}
