//! Embedding computation shared by the indexer and the retriever.
//!
//! [`Embedder`] wraps a rig [`EmbeddingModel`] and is constructed once per
//! process, then shared by reference between the pipeline components so that
//! chunks and queries are always embedded by the same model. All vectors it
//! returns are L2-normalized to unit length.

use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};

use crate::types::AssistantError;

/// Shared embedding handle producing unit-length `f32` vectors.
#[derive(Clone, Debug)]
pub struct Embedder<E> {
    model: E,
}

impl<E> Embedder<E>
where
    E: EmbeddingModel,
{
    pub fn new(model: E) -> Self {
        Self { model }
    }

    /// Dimensionality of the vectors this embedder produces.
    pub fn ndims(&self) -> usize {
        self.model.ndims()
    }

    /// The wrapped model, for components that need the raw handle.
    pub fn model(&self) -> &E {
        &self.model
    }

    /// Embeds a batch of documents, respecting the model's batch limit.
    pub async fn embed_documents(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, AssistantError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(E::MAX_DOCUMENTS.max(1)) {
            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|err| AssistantError::Generation(err.to_string()))?;
            vectors.extend(embeddings.into_iter().map(|e| normalize(e.vec)));
        }
        Ok(vectors)
    }

    /// Embeds a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AssistantError> {
        let embeddings = self
            .model
            .embed_texts(vec![text.to_string()])
            .await
            .map_err(|err| AssistantError::Generation(err.to_string()))?;
        let first = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::Generation("embedding call returned no vector".into()))?;
        Ok(normalize(first.vec))
    }
}

/// Scales a raw vector to unit L2 length; the zero vector is returned as-is.
fn normalize(raw: Vec<f64>) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return raw.into_iter().map(|v| v as f32).collect();
    }
    raw.into_iter().map(|v| (v / norm) as f32).collect()
}

/// Deterministic, offline embedding model for tests and local runs.
///
/// Vectors are derived from a hash of the input text: identical text always
/// maps to the identical vector, different texts diverge with high
/// probability. Not semantically meaningful.
#[derive(Clone, Debug, Default)]
pub struct DeterministicEmbeddingModel;

impl EmbeddingModel for DeterministicEmbeddingModel {
    const MAX_DOCUMENTS: usize = 64;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
        Self
    }

    fn ndims(&self) -> usize {
        8
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let docs: Vec<String> = texts.into_iter().collect();
        async move {
            Ok(docs
                .into_iter()
                .map(|document| Embedding {
                    vec: hash_to_vec(&document),
                    document,
                })
                .collect())
        }
    }
}

fn hash_to_vec(text: &str) -> Vec<f64> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..8)
        .map(|i| {
            let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
            (bits as f64) / u32::MAX as f64
        })
        .collect()
}
