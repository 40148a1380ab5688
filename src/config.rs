//! Runtime configuration and model-provider construction.
//!
//! All knobs here are user-adjustable at runtime; nothing requires a config
//! file. The API credential is the one value with an environment fallback,
//! resolved through dotenvy the same way a `.env` would supply it in
//! development.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use rig::client::{CompletionClient, EmbeddingsClient};
use rig::completion::CompletionModel;
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;

use crate::types::AssistantError;

pub const CHUNK_SIZE_RANGE: RangeInclusive<usize> = 500..=2000;
pub const CHUNK_OVERLAP_RANGE: RangeInclusive<usize> = 0..=500;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=1.0;
pub const MAX_RESULTS_RANGE: RangeInclusive<usize> = 1..=10;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Tunable settings for one assistant process.
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    /// Target chunk length in characters (500-2000).
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks (0-500).
    pub chunk_overlap: usize,
    /// Sampling temperature for chat completion (0.0-1.0).
    pub temperature: f64,
    /// Maximum retrieval results per question (1-10).
    pub max_results: usize,
    /// Route page fetches through the JS-rendering strategy.
    pub rendered_fetch: bool,
    /// WebDriver endpoint used when `rendered_fetch` is on.
    pub webdriver_url: String,
    /// Chat-completion model identifier.
    pub chat_model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Root directory under which per-session index directories live.
    pub data_dir: PathBuf,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            temperature: 0.7,
            max_results: 3,
            rendered_fetch: false,
            webdriver_url: "http://localhost:4444".to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            data_dir: PathBuf::from("./askforge_data"),
        }
    }
}

impl AssistantConfig {
    /// Rejects out-of-range settings before any processing starts.
    pub fn validate(&self) -> Result<(), AssistantError> {
        if !CHUNK_SIZE_RANGE.contains(&self.chunk_size) {
            return Err(AssistantError::InvalidInput(format!(
                "chunk_size {} outside {}..={}",
                self.chunk_size,
                CHUNK_SIZE_RANGE.start(),
                CHUNK_SIZE_RANGE.end()
            )));
        }
        if !CHUNK_OVERLAP_RANGE.contains(&self.chunk_overlap) {
            return Err(AssistantError::InvalidInput(format!(
                "chunk_overlap {} outside {}..={}",
                self.chunk_overlap,
                CHUNK_OVERLAP_RANGE.start(),
                CHUNK_OVERLAP_RANGE.end()
            )));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(AssistantError::InvalidInput(format!(
                "temperature {} outside {}..={}",
                self.temperature,
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        if !MAX_RESULTS_RANGE.contains(&self.max_results) {
            return Err(AssistantError::InvalidInput(format!(
                "max_results {} outside {}..={}",
                self.max_results,
                MAX_RESULTS_RANGE.start(),
                MAX_RESULTS_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// Resolves the API credential: the explicitly supplied key wins, otherwise
/// fall back to `OPENAI_API_KEY` from the environment or a `.env` file.
pub fn resolve_api_key(supplied: Option<&str>) -> Result<String, AssistantError> {
    if let Some(key) = supplied {
        let key = key.trim();
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
    dotenvy::dotenv().ok();
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            AssistantError::Credential(
                "no API key supplied and OPENAI_API_KEY is not set".to_string(),
            )
        })
}

/// Builds the hosted chat-completion model for the given credential.
pub fn openai_chat_model(api_key: &str, model: &str) -> impl CompletionModel + Send + Sync {
    openai::Client::<reqwest::Client>::new(api_key)
        .expect("failed to build OpenAI client")
        .completion_model(model)
}

/// Builds the hosted embedding model for the given credential.
pub fn openai_embedding_model(
    api_key: &str,
    model: &str,
) -> impl EmbeddingModel + Clone + Send + Sync + 'static {
    openai::Client::<reqwest::Client>::new(api_key)
        .expect("failed to build OpenAI client")
        .embedding_model(model)
}
