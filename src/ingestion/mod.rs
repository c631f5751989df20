//! Collection construction: the indexer that turns documents into an embedded
//! chunk store, and the JSON sidecar describing what a collection holds.

pub mod indexer;
pub mod metadata;

pub use indexer::{BuildReport, Indexer};
pub use metadata::{
    CollectionMetadata, DocumentStats, METADATA_FILE, discover_collections,
};
