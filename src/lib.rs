//! ```text
//! sources::LocalFiles ──► Vec<Document>
//!                              │
//!                              ▼
//! ingestion::Indexer ──┬─► chunking::ChunkPolicy ──► chunk texts
//!                      ├─► embeddings::EmbeddingProvider ──► vectors
//!                      └─► stores::SqliteVectorStore + metadata sidecar
//!
//! retrieval::RagSession ──► Retriever ──► ranked QueryHits
//!                      │            └─► relevance_scores
//!                      ├─► ContextAssembler ──► prompt context + citations
//!                      └─► generation::GenerationProvider ──► RagResponse
//! ```
//!
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod retrieval;
pub mod sources;
pub mod stores;
pub mod types;

pub use chunking::ChunkPolicy;
pub use config::RagConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OllamaEmbedder};
pub use generation::{GenerationProvider, OllamaGenerator, ProviderCache};
pub use ingestion::{BuildReport, CollectionMetadata, Indexer, discover_collections};
pub use retrieval::{ContextAssembler, RagResponse, RagSession, Retriever};
pub use sources::{DocumentSource, LocalFiles};
pub use stores::{ChunkRecord, QueryHit, SqliteVectorStore, VectorStore};
pub use types::{Document, DocumentMetadata, RagError};
