//! Generation capability contract, the Ollama client, and the provider cache.
//!
//! The pipeline treats text generation as an opaque blocking call:
//! `complete(prompt, max_tokens, temperature) -> String`. [`OllamaGenerator`]
//! implements it over `/api/generate`. [`ProviderCache`] hands out shared
//! client instances keyed by `(base_url, model)` so expensive resources are
//! created once per distinct configuration and can be explicitly dropped,
//! instead of living in implicit memoized globals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::embeddings::OllamaEmbedder;
use crate::types::RagError;

/// Contract over the external generation capability. May fail with a
/// network/timeout/model error; no timeout is enforced internally.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, RagError>;
}

/// Generation provider backed by Ollama's `/api/generate` endpoint.
#[derive(Clone, Debug)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    /// Create a generator for `model` served at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, RagError> {
        let base = Url::parse(base_url)
            .map_err(|err| RagError::Generation(format!("invalid base url '{base_url}': {err}")))?;
        let endpoint = base
            .join("/api/generate")
            .map_err(|err| RagError::Generation(err.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
        })
    }

    /// Model name this generator was created for.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, RagError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;

        if !response.status().is_success() {
            return Err(RagError::Generation(format!(
                "ollama returned {} for model '{}'",
                response.status(),
                self.model
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;
        Ok(body.response)
    }
}

/// Cache key: one client per distinct endpoint/model pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub base_url: String,
    pub model: String,
}

impl ProviderKey {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

/// Explicit cache for generation and embedding clients.
///
/// Each distinct `(base_url, model)` pair gets a single shared instance;
/// [`invalidate`](Self::invalidate) and [`clear`](Self::clear) give the owner
/// direct control over teardown.
#[derive(Default)]
pub struct ProviderCache {
    generators: Mutex<HashMap<ProviderKey, Arc<OllamaGenerator>>>,
    embedders: Mutex<HashMap<ProviderKey, Arc<OllamaEmbedder>>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared generator for the given endpoint/model, created on first use.
    pub fn generator(
        &self,
        base_url: &str,
        model: &str,
    ) -> Result<Arc<OllamaGenerator>, RagError> {
        let key = ProviderKey::new(base_url, model);
        let mut guard = self.generators.lock();
        if let Some(existing) = guard.get(&key) {
            return Ok(existing.clone());
        }
        let created = Arc::new(OllamaGenerator::new(base_url, model)?);
        guard.insert(key, created.clone());
        Ok(created)
    }

    /// Shared embedder for the given endpoint/model, created on first use.
    pub fn embedder(&self, base_url: &str, model: &str) -> Result<Arc<OllamaEmbedder>, RagError> {
        let key = ProviderKey::new(base_url, model);
        let mut guard = self.embedders.lock();
        if let Some(existing) = guard.get(&key) {
            return Ok(existing.clone());
        }
        let created = Arc::new(OllamaEmbedder::new(base_url, model)?);
        guard.insert(key, created.clone());
        Ok(created)
    }

    /// Drop the cached clients for one endpoint/model pair.
    pub fn invalidate(&self, base_url: &str, model: &str) {
        let key = ProviderKey::new(base_url, model);
        self.generators.lock().remove(&key);
        self.embedders.lock().remove(&key);
    }

    /// Drop every cached client.
    pub fn clear(&self) {
        self.generators.lock().clear();
        self.embedders.lock().clear();
    }
}
