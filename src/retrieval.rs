//! Similarity search over the session's persisted index.

use std::sync::Arc;

use rig::embeddings::EmbeddingModel;
use tracing::debug;

use crate::config::MAX_RESULTS_RANGE;
use crate::embeddings::Embedder;
use crate::stores::VectorBackend;
use crate::types::AssistantError;

/// Minimum similarity a hit must strictly exceed to count as relevant.
pub const SIMILARITY_THRESHOLD: f32 = 0.5;

/// One retrieval hit, ready for prompt composition.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub similarity: f32,
}

/// Result of a retrieval pass.
///
/// `NoContext` is not an error: it means nothing in the index cleared the
/// threshold (or the index is empty) and response generation must be
/// short-circuited with the fixed no-content message.
#[derive(Clone, Debug)]
pub enum RetrievalOutcome {
    NoContext,
    Hits(Vec<RetrievedChunk>),
}

/// Embeds queries and ranks stored chunks against them.
#[derive(Clone)]
pub struct Retriever<E> {
    embedder: Arc<Embedder<E>>,
}

impl<E> Retriever<E>
where
    E: EmbeddingModel,
{
    pub fn new(embedder: Arc<Embedder<E>>) -> Self {
        Self { embedder }
    }

    /// Returns the top `max_results` chunks scoring strictly above
    /// [`SIMILARITY_THRESHOLD`], most similar first.
    pub async fn retrieve(
        &self,
        backend: &dyn VectorBackend,
        query: &str,
        max_results: usize,
    ) -> Result<RetrievalOutcome, AssistantError> {
        let k = max_results.clamp(*MAX_RESULTS_RANGE.start(), *MAX_RESULTS_RANGE.end());
        let query_vector = self.embedder.embed_query(query).await?;
        let candidates = backend.search_similar(&query_vector, k).await?;
        debug!(candidates = candidates.len(), k, "similarity search returned");

        let hits: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter(|(_, similarity)| *similarity > SIMILARITY_THRESHOLD)
            .take(k)
            .map(|(chunk, similarity)| RetrievedChunk {
                content: chunk.content,
                source: chunk.source,
                similarity,
            })
            .collect();

        if hits.is_empty() {
            Ok(RetrievalOutcome::NoContext)
        } else {
            Ok(RetrievalOutcome::Hits(hits))
        }
    }
}
