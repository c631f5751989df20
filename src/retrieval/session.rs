//! The answer surface. A [`RagSession`] loads one built collection at a time
//! and answers questions against it: retrieve, assemble context, prompt the
//! generator, and report the supporting sources alongside the answer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::context::ContextAssembler;
use super::{DEFAULT_TOP_K, Retriever, relevance_scores};
use crate::embeddings::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::ingestion::{CollectionMetadata, discover_collections};
use crate::stores::sqlite::STORE_FILE;
use crate::stores::{SqliteVectorStore, VectorStore};
use crate::types::RagError;

/// One retrieved chunk with its normalized relevance, as surfaced to callers.
#[derive(Clone, Debug)]
pub struct RetrievedSource {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// `1.0` nearest, `0.0` farthest within this result set.
    pub relevance: f32,
}

/// Answer plus the evidence behind it.
///
/// A generation failure is not fatal: `answer` is empty, `error` holds the
/// message, and the retrieved sources are still present.
#[derive(Clone, Debug)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<RetrievedSource>,
    /// Deduplicated source paths, first-appearance order.
    pub cited: Vec<String>,
    pub error: Option<String>,
}

struct LoadedCollection {
    retriever: Retriever,
    metadata: CollectionMetadata,
    directory: PathBuf,
}

/// Query orchestrator over built collections.
pub struct RagSession {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    max_tokens: u32,
    temperature: f32,
    loaded: Option<LoadedCollection>,
}

impl RagSession {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            embedder,
            generator,
            max_tokens: 1000,
            temperature: 0.1,
            loaded: None,
        }
    }

    #[must_use]
    pub fn with_generation_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Metadata of the loaded collection, if any.
    pub fn metadata(&self) -> Option<&CollectionMetadata> {
        self.loaded.as_ref().map(|loaded| &loaded.metadata)
    }

    /// Load the collection built at `dir`, replacing any previously loaded
    /// one. The directory must hold both the chunk store and its sidecar.
    pub async fn load(&mut self, dir: &Path) -> Result<(), RagError> {
        let metadata = CollectionMetadata::load(dir).await?;
        let store = SqliteVectorStore::open(dir.join(STORE_FILE)).await?;
        store.get_collection(&metadata.collection_name).await?;

        info!(
            collection = %metadata.collection_name,
            chunk_count = metadata.chunk_count,
            directory = %dir.display(),
            "collection loaded"
        );
        self.loaded = Some(LoadedCollection {
            retriever: Retriever::new(
                Arc::new(store),
                metadata.collection_name.clone(),
                self.embedder.clone(),
            ),
            metadata,
            directory: dir.to_path_buf(),
        });
        Ok(())
    }

    /// Load the first collection found under `root` (lexicographic order).
    pub async fn load_first(&mut self, root: &Path) -> Result<(), RagError> {
        let collections = discover_collections(root).await?;
        let first = collections
            .first()
            .ok_or_else(|| RagError::CollectionNotFound(root.display().to_string()))?;
        self.load(first).await
    }

    /// Directory of the loaded collection, if any.
    pub fn directory(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|loaded| loaded.directory.as_path())
    }

    /// Answer `question` from the loaded collection.
    ///
    /// Fails with [`RagError::NotInitialized`] when no collection is loaded
    /// and propagates retrieval errors; generation errors are folded into the
    /// response instead so callers keep the retrieved evidence.
    pub async fn query(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<RagResponse, RagError> {
        let loaded = self.loaded.as_ref().ok_or(RagError::NotInitialized)?;
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);

        let hits = loaded.retriever.retrieve(question, top_k).await?;
        let scores = relevance_scores(&hits);
        let assembled = ContextAssembler.assemble(&hits);

        let sources = hits
            .into_iter()
            .zip(scores)
            .map(|(hit, relevance)| RetrievedSource {
                id: hit.id,
                content: hit.content,
                metadata: hit.metadata,
                relevance,
            })
            .collect();

        let prompt = build_prompt(question, &assembled.context);
        match self
            .generator
            .complete(&prompt, self.max_tokens, self.temperature)
            .await
        {
            Ok(answer) => Ok(RagResponse {
                answer,
                sources,
                cited: assembled.cited,
                error: None,
            }),
            Err(err) => {
                warn!(error = %err, "generation failed; returning sources without an answer");
                Ok(RagResponse {
                    answer: String::new(),
                    sources,
                    cited: assembled.cited,
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

/// Grounded-answer prompt: the model is told to rely on the retrieved
/// context only.
fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the following question based only on the provided context:\n\n\
         Question: {question}\n\n\
         Context:\n{context}\n\nAnswer:"
    )
}
