//! Durable collection metadata, persisted as `metadata.json` next to the
//! vector store's native files.
//!
//! The sidecar is overwritten wholesale on every successful build and shares
//! its lifecycle with the persisted collection: created together, destroyed
//! together on a forced rebuild, read together at query-time load.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::types::RagError;

/// File name of the metadata sidecar inside a collection directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Per-source statistics tracked during a build.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentStats {
    /// Chunks successfully inserted for this source.
    pub chunks: usize,
    /// Page numbers referenced by this source, for paged formats.
    pub pages: BTreeSet<u32>,
}

/// Collection statistics written after each successful build.
///
/// Serializes to the exact on-disk schema:
///
/// ```json
/// { "collection_name": "documents",
///   "document_count": 2,
///   "chunk_count": 3,
///   "documents": { "report.pdf": { "chunks": 2, "pages": [1, 2] } },
///   "created_at": "2026-08-30 12:00:00" }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub collection_name: String,
    pub document_count: usize,
    pub chunk_count: usize,
    /// Keyed by source path; `BTreeMap` keeps the serialized form stable.
    pub documents: BTreeMap<String, DocumentStats>,
    pub created_at: String,
}

impl CollectionMetadata {
    /// Fresh metadata stamped with the current time.
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            document_count: 0,
            chunk_count: 0,
            documents: BTreeMap::new(),
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Load the sidecar from `dir`. A missing file is a structured
    /// [`RagError::CollectionNotFound`], since the sidecar and the collection
    /// share one lifecycle.
    pub async fn load(dir: &Path) -> Result<Self, RagError> {
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Err(RagError::CollectionNotFound(dir.display().to_string()));
        }
        let raw = fs::read_to_string(&path).await?;
        serde_json::from_str(&raw).map_err(|err| {
            RagError::Storage(format!("corrupt metadata at {}: {err}", path.display()))
        })
    }

    /// Overwrite the sidecar in `dir`.
    pub async fn save(&self, dir: &Path) -> Result<(), RagError> {
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|err| RagError::Storage(err.to_string()))?;
        fs::write(dir.join(METADATA_FILE), serialized).await?;
        Ok(())
    }
}

/// Lists subdirectories of `root` that carry a metadata sidecar, i.e. the
/// loadable collections under a RAG root.
pub async fn discover_collections(root: &Path) -> Result<Vec<std::path::PathBuf>, RagError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() && path.join(METADATA_FILE).exists() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sidecar_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let mut metadata = CollectionMetadata::new("documents");
        metadata.document_count = 2;
        metadata.chunk_count = 3;
        metadata.documents.insert(
            "report.pdf".to_string(),
            DocumentStats {
                chunks: 2,
                pages: BTreeSet::from([1, 2]),
            },
        );

        metadata.save(dir.path()).await.unwrap();
        let loaded = CollectionMetadata::load(dir.path()).await.unwrap();
        assert_eq!(loaded, metadata);
    }

    #[tokio::test]
    async fn serialized_schema_uses_the_contract_field_names() {
        let mut metadata = CollectionMetadata::new("documents");
        metadata.documents.insert(
            "notes.txt".to_string(),
            DocumentStats {
                chunks: 1,
                pages: BTreeSet::new(),
            },
        );
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&metadata).unwrap()).unwrap();

        assert!(value.get("collection_name").is_some());
        assert!(value.get("document_count").is_some());
        assert!(value.get("chunk_count").is_some());
        assert!(value.get("created_at").is_some());
        assert_eq!(
            value["documents"]["notes.txt"]["chunks"],
            serde_json::json!(1)
        );
        assert!(value["documents"]["notes.txt"]["pages"].is_array());
    }

    #[tokio::test]
    async fn missing_sidecar_is_collection_not_found() {
        let dir = tempdir().unwrap();
        let err = CollectionMetadata::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn discovery_only_reports_directories_with_sidecars() {
        let root = tempdir().unwrap();
        let with = root.path().join("kb_one");
        let without = root.path().join("scratch");
        tokio::fs::create_dir_all(&with).await.unwrap();
        tokio::fs::create_dir_all(&without).await.unwrap();
        CollectionMetadata::new("documents").save(&with).await.unwrap();

        let found = discover_collections(root.path()).await.unwrap();
        assert_eq!(found, vec![with]);
    }

    #[tokio::test]
    async fn discovery_of_missing_root_is_empty() {
        let root = tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(discover_collections(&missing).await.unwrap().is_empty());
    }
}
