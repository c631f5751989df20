//! Build orchestration: chunk every document, embed every chunk, insert into
//! the vector store, and write the metadata sidecar.
//!
//! The build decision is binary: reuse an existing collection untouched, or
//! replace it in full. There is no incremental merge; a rebuild invalidates
//! every prior chunk id for the output path.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::metadata::{CollectionMetadata, DocumentStats};
use crate::chunking::ChunkPolicy;
use crate::embeddings::EmbeddingProvider;
use crate::stores::sqlite::STORE_FILE;
use crate::stores::{ChunkRecord, SqliteVectorStore, VectorStore};
use crate::types::{Document, RagError, source_basename};

/// Outcome of one [`Indexer::build`] call. Counts reflect only chunks that
/// actually landed in the store, never estimates from the input.
#[derive(Clone, Debug)]
pub struct BuildReport {
    pub collection: String,
    pub chunk_count: usize,
    pub document_count: usize,
    /// Chunks dropped by the partial-failure policy (embedding or insertion
    /// failed).
    pub skipped_chunks: usize,
    /// `true` when an existing collection was opened and left untouched.
    pub reused: bool,
}

/// Orchestrates chunking, embedding, and insertion for a document set.
pub struct Indexer {
    policy: ChunkPolicy,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            policy: ChunkPolicy::default(),
            embedder,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build (or reuse) the collection at `output_dir`.
    ///
    /// - `output_dir` exists and `force_reindex` is false: open the existing
    ///   collection and report its stored chunk count; zero writes.
    /// - otherwise: delete any prior collection in full, recreate it, and
    ///   index every document. A chunk that fails to embed or insert is
    ///   logged and skipped; the rest of the build continues. The sidecar is
    ///   rewritten with a fresh `created_at` even when the chunk content is
    ///   identical to the previous build.
    pub async fn build(
        &self,
        documents: &[Document],
        output_dir: &Path,
        collection_name: &str,
        force_reindex: bool,
    ) -> Result<BuildReport, RagError> {
        if output_dir.exists() && !force_reindex {
            return self.reuse_existing(output_dir, collection_name).await;
        }
        self.rebuild(documents, output_dir, collection_name).await
    }

    async fn reuse_existing(
        &self,
        output_dir: &Path,
        collection_name: &str,
    ) -> Result<BuildReport, RagError> {
        let store = SqliteVectorStore::open(output_dir.join(STORE_FILE)).await?;
        store.get_collection(collection_name).await?;
        let chunk_count = store.count(collection_name).await?;
        let document_count = CollectionMetadata::load(output_dir)
            .await
            .map(|metadata| metadata.document_count)
            .unwrap_or(0);

        info!(
            collection = collection_name,
            chunk_count, "reusing existing collection"
        );
        Ok(BuildReport {
            collection: collection_name.to_string(),
            chunk_count,
            document_count,
            skipped_chunks: 0,
            reused: true,
        })
    }

    async fn rebuild(
        &self,
        documents: &[Document],
        output_dir: &Path,
        collection_name: &str,
    ) -> Result<BuildReport, RagError> {
        // Total replacement: the old collection and its sidecar go together.
        if output_dir.exists() {
            tokio::fs::remove_dir_all(output_dir).await?;
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let store = SqliteVectorStore::open(output_dir.join(STORE_FILE)).await?;
        store.create_collection(collection_name).await?;

        let mut metadata = CollectionMetadata::new(collection_name);
        metadata.document_count = documents.len();
        let mut skipped_chunks = 0usize;

        for (doc_index, document) in documents.iter().enumerate() {
            let source = document.metadata.source.clone();
            let stats = metadata.documents.entry(source.clone()).or_default();
            if let Some(page) = document.metadata.page {
                stats.pages.insert(page);
            }

            let chunks = match self.policy.split(&document.text) {
                Ok(chunks) => chunks,
                Err(err) => {
                    warn!(source = %source, error = %err, "skipping document: chunking failed");
                    continue;
                }
            };

            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                let chunk_id =
                    format!("{}_{}_{}", source_basename(&source), doc_index, chunk_index);

                let embedding = match self.embedder.embed(&chunk).await {
                    Ok(embedding) => embedding,
                    Err(err) => {
                        warn!(
                            chunk_id = %chunk_id,
                            source = %source,
                            error = %err,
                            "skipping chunk: embedding failed"
                        );
                        skipped_chunks += 1;
                        continue;
                    }
                };

                let mut chunk_metadata = serde_json::json!({
                    "source": source,
                    "document_id": doc_index,
                    "chunk_id": chunk_index,
                });
                if let Some(page) = document.metadata.page {
                    chunk_metadata["page"] = serde_json::json!(page);
                }

                let record = ChunkRecord::new(&chunk_id, &source, doc_index, chunk_index, chunk)
                    .with_metadata(chunk_metadata)
                    .with_embedding(embedding);

                // Insert one record per call so a storage failure skips this
                // chunk only, matching the embedding failure policy.
                match store.insert_chunks(collection_name, vec![record]).await {
                    Ok(_) => {
                        if let Some(stats) = metadata.documents.get_mut(&source) {
                            stats.chunks += 1;
                        }
                    }
                    Err(err) => {
                        warn!(
                            chunk_id = %chunk_id,
                            source = %source,
                            error = %err,
                            "skipping chunk: insertion failed"
                        );
                        skipped_chunks += 1;
                    }
                }
            }
        }

        // The authoritative count comes from the store, not the loop above.
        metadata.chunk_count = store.count(collection_name).await?;
        metadata.save(output_dir).await?;

        info!(
            collection = collection_name,
            chunk_count = metadata.chunk_count,
            document_count = metadata.document_count,
            skipped_chunks,
            "collection rebuilt"
        );

        Ok(BuildReport {
            collection: collection_name.to_string(),
            chunk_count: metadata.chunk_count,
            document_count: metadata.document_count,
            skipped_chunks,
            reused: false,
        })
    }
}
