//! Runtime configuration with compiled defaults overridable from the
//! environment (`RAGFORGE_*` variables, `.env` honored via `dotenvy`).

use crate::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::retrieval::DEFAULT_TOP_K;

/// Tunables for the whole pipeline. Every field has a working default so a
/// bare `RagConfig::default()` runs against a local Ollama.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Directory holding one subdirectory per collection.
    pub rag_root: String,
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub ollama_url: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            rag_root: "rag_databases".to_string(),
            collection_name: "documents".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            ollama_url: "http://localhost:11434".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            max_tokens: 1000,
            temperature: 0.1,
        }
    }
}

impl RagConfig {
    /// Defaults overlaid with any `RAGFORGE_*` environment variables.
    /// Unparseable numeric values fall back to the default silently; env
    /// configuration is best-effort.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(value) = std::env::var("RAGFORGE_ROOT") {
            config.rag_root = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_COLLECTION") {
            config.collection_name = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_CHUNK_SIZE") {
            if let Ok(parsed) = value.parse() {
                config.chunk_size = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGFORGE_CHUNK_OVERLAP") {
            if let Ok(parsed) = value.parse() {
                config.chunk_overlap = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGFORGE_TOP_K") {
            if let Ok(parsed) = value.parse() {
                config.top_k = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGFORGE_OLLAMA_URL") {
            config.ollama_url = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_GENERATION_MODEL") {
            config.generation_model = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_EMBEDDING_MODEL") {
            config.embedding_model = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_MAX_TOKENS") {
            if let Ok(parsed) = value.parse() {
                config.max_tokens = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGFORGE_TEMPERATURE") {
            if let Ok(parsed) = value.parse() {
                config.temperature = parsed;
            }
        }

        config
    }
}
