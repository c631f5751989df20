//! Query-time half of the pipeline: similarity search over a built
//! collection, relevance scoring, context assembly, and the session that ties
//! retrieval to answer generation.

pub mod context;
pub mod session;

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::stores::{QueryHit, VectorStore};
use crate::types::RagError;

pub use context::{AssembledContext, ContextAssembler};
pub use session::{RagResponse, RagSession, RetrievedSource};

/// Result-set size when the caller does not specify one.
pub const DEFAULT_TOP_K: usize = 4;

/// Embeds a query and runs similarity search against one collection.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            embedder,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Top-`k` chunks by cosine distance, nearest first. Fewer than `k`
    /// stored chunks returns all of them; an empty collection returns an
    /// empty set, never an error.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<QueryHit>, RagError> {
        let embedding = self.embedder.embed(query).await?;
        self.store
            .query_embedding(&self.collection, &embedding, top_k)
            .await
    }
}

/// Normalized relevance for a distance-ordered result set.
///
/// Each score is `1 - distance / max_distance`, so the farthest hit scores
/// 0.0 and nearer hits score proportionally higher. When every distance is
/// zero (or there is a single exact match) all hits score 1.0.
pub fn relevance_scores(hits: &[QueryHit]) -> Vec<f32> {
    let max_distance = hits
        .iter()
        .map(|hit| hit.distance)
        .fold(0.0f32, f32::max);
    hits.iter()
        .map(|hit| {
            if max_distance > 0.0 {
                1.0 - hit.distance / max_distance
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(distance: f32) -> QueryHit {
        QueryHit {
            id: format!("doc_0_{distance}"),
            content: "text".to_string(),
            metadata: serde_json::json!({}),
            distance,
        }
    }

    #[test]
    fn relevance_is_monotonically_decreasing_in_distance() {
        let hits = vec![hit(0.1), hit(0.4), hit(0.8)];
        let scores = relevance_scores(&hits);
        assert!(scores[0] > scores[1] && scores[1] > scores[2]);
        assert!((scores[2] - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn all_zero_distances_score_one() {
        let hits = vec![hit(0.0), hit(0.0)];
        assert_eq!(relevance_scores(&hits), vec![1.0, 1.0]);
    }

    #[test]
    fn empty_result_set_scores_nothing() {
        assert!(relevance_scores(&[]).is_empty());
    }
}
