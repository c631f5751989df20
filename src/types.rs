//! Core domain types shared across the ingestion and retrieval pipeline.
//!
//! A [`Document`] is the unit handed to the indexer by a loader; it is
//! immutable once created. Chunk-level types live in [`crate::stores`]
//! because their shape is dictated by what the vector store persists.
//!
//! [`RagError`] is the single error taxonomy for the crate. Conditions a
//! caller is expected to branch on (`CollectionNotFound`, `NotInitialized`)
//! are distinct variants, never inferred from message text.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A raw document produced by a loader, ready for chunking and indexing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Loader-assigned identifier (typically the source path).
    pub id: String,
    /// Full document text.
    pub text: String,
    /// Provenance carried through to every chunk cut from this document.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document whose id doubles as its source path.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: source.clone(),
            text: text.into(),
            metadata: DocumentMetadata {
                source,
                page: None,
                total_pages: None,
            },
        }
    }

    /// Attach page provenance, for loaders that split paged formats.
    #[must_use]
    pub fn with_page(mut self, page: u32, total_pages: u32) -> Self {
        self.metadata.page = Some(page);
        self.metadata.total_pages = Some(total_pages);
        self
    }
}

/// Provenance metadata for a [`Document`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Originating path or identifier.
    pub source: String,
    /// One-based page number, when the loader splits paged formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Total pages in the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

/// Returns the final path component of `source`, falling back to the whole
/// string when it has no file name (e.g. a bare identifier).
pub fn source_basename(source: &str) -> String {
    Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}

/// Error taxonomy for the ingestion and retrieval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A document could not be read or parsed. The build skips it. The field
    /// is named `path`, not `source`, so thiserror does not treat it as an
    /// error cause.
    #[error("failed to load document '{path}': {reason}")]
    Load { path: String, reason: String },

    /// The embedding capability failed for one input.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The requested collection does not exist.
    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// A query was issued before any collection was loaded.
    #[error("no collection loaded; build or load one before querying")]
    NotInitialized,

    /// The generation capability failed. Surfaced to callers, never papered
    /// over with fabricated answer text.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Input that cannot be chunked or indexed as-is.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The chunking policy failed (token encoding, config).
    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
