//! Embedding capability contract and providers.
//!
//! The pipeline never computes vectors itself; it calls an
//! [`EmbeddingProvider`]. [`OllamaEmbedder`] talks to a local Ollama
//! instance; [`MockEmbeddingProvider`] produces deterministic hash-derived
//! vectors for tests and offline runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::RagError;

/// Contract over the external embedding capability:
/// `embed(text) -> Vec<f32>`, deterministic for a fixed model, may fail per
/// call. Calls block until the provider answers; callers needing bounded
/// latency wrap them with their own timeout.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed a batch of texts. The default issues sequential calls; providers
    /// with a batch endpoint can override.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Embedding provider backed by Ollama's `/api/embeddings` endpoint.
#[derive(Clone, Debug)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create an embedder for `model` served at `base_url`
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, RagError> {
        let base = Url::parse(base_url)
            .map_err(|err| RagError::Embedding(format!("invalid base url '{base_url}': {err}")))?;
        let endpoint = base
            .join("/api/embeddings")
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
        })
    }

    /// Model name this embedder was created for.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RagError::Embedding(format!(
                "ollama returned {} for model '{}'",
                response.status(),
                self.model
            )));
        }

        let body: EmbeddingsResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(RagError::Embedding(format!(
                "ollama returned an empty embedding for model '{}'",
                self.model
            )));
        }
        Ok(body.embedding)
    }
}

/// Deterministic embedding provider for tests and offline pipelines.
///
/// Vectors are derived from a hash of the input, so identical texts embed
/// identically across runs while distinct texts diverge.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: 8 }
    }

    pub fn with_dims(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(hash_to_vec(text, self.dims))
    }
}

fn hash_to_vec(text: &str, dims: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dims)
        .map(|i| {
            let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let a1 = provider.embed("hello world").await.unwrap();
        let a2 = provider.embed("hello world").await.unwrap();
        let b = provider.embed("goodbye world").await.unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 8);
    }

    #[tokio::test]
    async fn batch_embeds_every_input() {
        let provider = MockEmbeddingProvider::with_dims(4);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 4));
    }

    #[tokio::test]
    async fn ollama_embedder_parses_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embeddings")
                    .json_body(json!({"model": "nomic-embed-text", "prompt": "chunk text"}));
                then.status(200)
                    .json_body(json!({"embedding": [0.1, 0.2, 0.3]}));
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "nomic-embed-text").unwrap();
        let vector = embedder.embed("chunk text").await.unwrap();
        mock.assert_async().await;
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn ollama_embedder_surfaces_server_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(500).body("model not found");
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "missing-model").unwrap();
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
