//! Vector storage: the [`VectorStore`] contract and its SQLite backend.
//!
//! The trait is a thin adapter over a persistent similarity-search
//! collection: create/open, insert, nearest-k query. Absent collections are
//! reported through the structured [`RagError::CollectionNotFound`] variant,
//! never inferred by matching error message text. A query returning fewer
//! than `k` hits because the collection is small is not an error.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │     SQLite       │
//!                  │   sqlite-vec     │
//!                  └──────────────────┘
//! ```

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteVectorStore;

/// A chunk with its provenance and (optionally) its embedding, ready for
/// insertion into a collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `"{basename(source)}_{doc_index}_{chunk_index}"`, unique within a
    /// collection, stable for one build generation.
    pub id: String,
    /// Originating document path or identifier.
    pub source: String,
    /// Index of the parent document within the build input.
    pub doc_index: usize,
    /// Index of this chunk within its parent document.
    pub chunk_index: usize,
    /// Chunk text.
    pub content: String,
    /// Arbitrary metadata persisted alongside the chunk.
    pub metadata: serde_json::Value,
    /// Embedding vector. `None` means the store should compute it, when it
    /// owns an embedding provider.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        doc_index: usize,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            doc_index,
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One nearest-neighbor match. Results are always ordered by ascending
/// distance (nearest first); any display score is derived later and never
/// reorders hits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Raw store distance (cosine); smaller is nearer.
    pub distance: f32,
}

/// Contract over a persistent similarity-search collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection; idempotent when it already exists.
    async fn create_collection(&self, name: &str) -> Result<(), RagError>;

    /// Fail with [`RagError::CollectionNotFound`] when `name` is absent.
    async fn get_collection(&self, name: &str) -> Result<(), RagError>;

    /// Open `name`, creating it first when absent.
    async fn get_or_create(&self, name: &str) -> Result<(), RagError>;

    /// Insert chunk records into `collection`, returning the number actually
    /// inserted. Records without an embedding are embedded by the store's own
    /// provider when it has one; otherwise they are skipped (and logged), not
    /// fatal.
    async fn insert_chunks(
        &self,
        collection: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<usize, RagError>;

    /// Nearest-k query by embedding, ascending distance. May legitimately
    /// return fewer than `top_k` hits.
    async fn query_embedding(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError>;

    /// Nearest-k query by text; requires the store to own an embedding
    /// provider.
    async fn query_text(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError>;

    /// Number of chunks currently stored in `collection`.
    async fn count(&self, collection: &str) -> Result<usize, RagError>;

    /// Every chunk id in `collection`, in insertion order.
    async fn chunk_ids(&self, collection: &str) -> Result<Vec<String>, RagError>;
}
