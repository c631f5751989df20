//! End-to-end pipeline coverage: index a document set into a real sqlite
//! store on disk, then answer questions through a session, with deterministic
//! mock providers standing in for Ollama.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::tempdir;

use ragforge::ingestion::{CollectionMetadata, Indexer};
use ragforge::retrieval::RagSession;
use ragforge::stores::sqlite::STORE_FILE;
use ragforge::{
    Document, GenerationProvider, MockEmbeddingProvider, RagError, SqliteVectorStore, VectorStore,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct CannedGenerator {
    answer: String,
}

#[async_trait]
impl GenerationProvider for CannedGenerator {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, RagError> {
        Ok(self.answer.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, RagError> {
        Err(RagError::Generation("model unavailable".to_string()))
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "/docs/rust.txt",
            "Rust is a systems programming language focused on safety and \
             concurrency. Ownership rules are enforced at compile time.",
        ),
        Document::new(
            "/docs/sqlite.txt",
            "SQLite is an embedded relational database stored in a single \
             file. Virtual tables extend it with custom storage engines.",
        ),
    ]
}

async fn build_collection(out: &Path) -> Indexer {
    init_tracing();
    let indexer = Indexer::new(Arc::new(MockEmbeddingProvider::new()));
    indexer
        .build(&corpus(), out, "documents", false)
        .await
        .unwrap();
    indexer
}

fn session(generator: Arc<dyn GenerationProvider>) -> RagSession {
    init_tracing();
    RagSession::new(Arc::new(MockEmbeddingProvider::new()), generator)
}

#[tokio::test]
async fn second_build_reuses_the_existing_collection() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    let indexer = build_collection(&out).await;
    let before = CollectionMetadata::load(&out).await.unwrap();

    let report = indexer.build(&corpus(), &out, "documents", false).await.unwrap();

    assert!(report.reused);
    assert_eq!(report.chunk_count, before.chunk_count);
    let after = CollectionMetadata::load(&out).await.unwrap();
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn forced_rebuild_refreshes_the_build_timestamp() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    let indexer = build_collection(&out).await;
    let before = CollectionMetadata::load(&out).await.unwrap();

    // Timestamp resolution is one second.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let report = indexer.build(&corpus(), &out, "documents", true).await.unwrap();

    assert!(!report.reused);
    let after = CollectionMetadata::load(&out).await.unwrap();
    assert_ne!(after.created_at, before.created_at);
    assert_eq!(after.chunk_count, before.chunk_count);
}

#[tokio::test]
async fn sidecar_counts_agree_with_the_store() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    build_collection(&out).await;

    let metadata = CollectionMetadata::load(&out).await.unwrap();
    let store = SqliteVectorStore::open(out.join(STORE_FILE)).await.unwrap();
    assert_eq!(
        metadata.chunk_count,
        store.chunk_ids("documents").await.unwrap().len()
    );
    assert_eq!(metadata.document_count, 2);
}

#[tokio::test]
async fn query_returns_answer_sources_and_citations() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    build_collection(&out).await;

    let mut session = session(Arc::new(CannedGenerator {
        answer: "Rust enforces ownership at compile time.".to_string(),
    }));
    session.load(&out).await.unwrap();

    let response = session.query("What is Rust?", None).await.unwrap();

    assert_eq!(response.answer, "Rust enforces ownership at compile time.");
    assert!(response.error.is_none());
    assert!(!response.sources.is_empty());
    assert!(response.cited.iter().all(|s| s.starts_with("/docs/")));

    // Relevance is normalized: nearest hit first, never increasing, and the
    // farthest hit anchors the scale at zero.
    let relevances: Vec<f32> = response.sources.iter().map(|s| s.relevance).collect();
    assert!(relevances.windows(2).all(|pair| pair[0] >= pair[1]));
    let last = *relevances.last().unwrap();
    assert!(last.abs() < 1e-6);
}

#[tokio::test]
async fn top_k_larger_than_the_collection_returns_everything() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    build_collection(&out).await;

    let mut session = session(Arc::new(CannedGenerator {
        answer: "ok".to_string(),
    }));
    session.load(&out).await.unwrap();

    // Two short documents produce one chunk each; default k is 4.
    let response = session.query("databases", None).await.unwrap();
    assert_eq!(response.sources.len(), 2);

    let capped = session.query("databases", Some(1)).await.unwrap();
    assert_eq!(capped.sources.len(), 1);
}

#[tokio::test]
async fn generation_failure_keeps_the_retrieved_sources() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("kb");
    build_collection(&out).await;

    let mut session = session(Arc::new(FailingGenerator));
    session.load(&out).await.unwrap();

    let response = session.query("anything", None).await.unwrap();

    assert!(response.answer.is_empty());
    assert!(response.error.as_deref().unwrap().contains("model unavailable"));
    assert!(!response.sources.is_empty());
}

#[tokio::test]
async fn loading_a_directory_without_a_collection_fails_structurally() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("empty");
    tokio::fs::create_dir_all(&empty).await.unwrap();

    let mut session = session(Arc::new(CannedGenerator {
        answer: "unused".to_string(),
    }));
    let err = session.load(&empty).await.unwrap_err();
    assert!(matches!(err, RagError::CollectionNotFound(_)));
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn load_first_picks_the_lexicographically_first_collection() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("collections");
    let indexer = Indexer::new(Arc::new(MockEmbeddingProvider::new()));
    indexer
        .build(&corpus(), &root.join("beta"), "documents", false)
        .await
        .unwrap();
    indexer
        .build(&corpus(), &root.join("alpha"), "documents", false)
        .await
        .unwrap();

    let mut session = session(Arc::new(CannedGenerator {
        answer: "ok".to_string(),
    }));
    session.load_first(&root).await.unwrap();

    assert_eq!(session.directory().unwrap(), root.join("alpha"));
    assert_eq!(session.metadata().unwrap().collection_name, "documents");
}
