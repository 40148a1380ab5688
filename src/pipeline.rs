//! The retrieval-augmented question-answering pipeline.
//!
//! ```text
//! candidates ──► fetch::partition ──► PageLoader ──► Chunker ──► EmbeddingIndexer
//!                                                                   (one-shot per
//!                                                                    process action)
//!
//! question ──► Retriever ──► ResponseGenerator ──► answer + updated Session
//!                  ▲                                      │
//!                  └──────────── Session state ◄──────────┘
//! ```
//!
//! Every dependency (page loader, embedding model, chat model, session
//! store) is injected at construction time and shared by reference.
//! Execution is sequential per session; the on-disk index is guarded only by
//! that sequencing, with concurrent sessions kept apart by disjoint index
//! paths.

use std::sync::Arc;

use rig::embeddings::EmbeddingModel;
use tracing::info;

use crate::chunking::TextSplitter;
use crate::config::AssistantConfig;
use crate::embeddings::Embedder;
use crate::export;
use crate::fetch::{self, FetchedSource, PageLoader};
use crate::generation::{
    GENERATION_ERROR_PREFIX, ResponseGenerator, format_context, topic_frequencies,
};
use crate::indexer::EmbeddingIndexer;
use crate::retrieval::{RetrievalOutcome, Retriever};
use crate::session::SessionStore;
use crate::stores::VectorBackend;
use crate::types::{AssistantError, QAExchange, SourceMetadata};
use crate::message::ChatMessage;

/// Fixed reply when a question arrives before any content was processed.
pub const NO_CONTENT_MESSAGE: &str =
    "Please process some content first before asking questions.";

/// Fixed reply when nothing in the index clears the similarity threshold.
pub const NO_RELEVANT_CONTENT_MESSAGE: &str =
    "No relevant information found in the processed content to answer this question.";

/// Fixed reply when a report is requested with no index on disk.
pub const EMPTY_REPORT_MESSAGE: &str =
    "No processed content available to generate a report.";

/// Number of stored chunks sampled for the summary report and topic analysis.
pub const REPORT_SAMPLE_LIMIT: usize = 5;

/// Outcome of one processing run.
#[derive(Clone, Debug)]
pub struct ProcessingReport {
    /// Metadata for every source the run registered, in input order.
    pub sources: Vec<SourceMetadata>,
    /// Candidate entries skipped before any network activity.
    pub skipped: Vec<String>,
    /// Chunks written to the fresh index.
    pub chunks_indexed: usize,
}

/// One answered question.
#[derive(Clone, Debug)]
pub struct Answer {
    pub text: String,
    /// Source references of the excerpts behind the answer.
    pub sources: Vec<String>,
}

/// Wires the pipeline components to per-session state.
pub struct ResearchPipeline<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    config: AssistantConfig,
    loader: Arc<dyn PageLoader>,
    indexer: EmbeddingIndexer<E>,
    retriever: Retriever<E>,
    generator: ResponseGenerator,
    sessions: Arc<SessionStore>,
}

impl<E> ResearchPipeline<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub fn new(
        config: AssistantConfig,
        loader: Arc<dyn PageLoader>,
        embedder: Embedder<E>,
        generator: ResponseGenerator,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.data_dir.clone()));
        Self::with_sessions(config, loader, embedder, generator, sessions)
    }

    pub fn with_sessions(
        config: AssistantConfig,
        loader: Arc<dyn PageLoader>,
        embedder: Embedder<E>,
        generator: ResponseGenerator,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let embedder = Arc::new(embedder);
        Self {
            config,
            loader,
            indexer: EmbeddingIndexer::new(Arc::clone(&embedder)),
            retriever: Retriever::new(embedder),
            generator,
            sessions,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Applies new runtime settings after validating their ranges.
    pub fn set_config(&mut self, config: AssistantConfig) -> Result<(), AssistantError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Low-cost test call validating the API credential before it is
    /// accepted. A failure blocks model-dependent operations until a new
    /// key is configured.
    pub async fn validate_credential(&self) -> Result<(), AssistantError> {
        self.generator
            .probe()
            .await
            .map_err(|err| AssistantError::Credential(err.message().to_string()))
    }

    /// The one-shot "process" action: fetch, chunk, and index, atomically
    /// replacing the session's previous index and source list.
    pub async fn process_sources(
        &self,
        session_id: &str,
        candidates: &[String],
        upload: Option<(&str, &[u8])>,
    ) -> Result<ProcessingReport, AssistantError> {
        self.config.validate()?;

        let mut skipped = Vec::new();
        let fetched: Vec<FetchedSource> = if let Some((file_name, bytes)) = upload {
            vec![fetch::upload_text(file_name, bytes)?]
        } else {
            let partition = fetch::partition_candidates(candidates);
            skipped = partition.skipped;
            if partition.accepted.is_empty() {
                return Err(AssistantError::InvalidInput(if skipped.is_empty() {
                    "enter at least one URL or upload a text file".to_string()
                } else {
                    "no valid URLs to process".to_string()
                }));
            }
            // The JS-rendering toggle swaps the fetch strategy per run.
            let rendered;
            let loader: &dyn PageLoader = if self.config.rendered_fetch {
                rendered = fetch::rendered_loader(&self.config.webdriver_url)?;
                &rendered
            } else {
                self.loader.as_ref()
            };
            fetch::fetch_sources(loader, &partition.accepted).await
        };

        let splitter = TextSplitter::new(self.config.chunk_size, self.config.chunk_overlap);
        let documents = fetched
            .iter()
            .filter_map(|source| {
                source
                    .body
                    .as_deref()
                    .map(|body| (body, source.metadata.origin.clone()))
            })
            .collect::<Vec<_>>();
        let chunks = splitter.split_sources(documents);

        let index_path =
            self.sessions
                .with_session(session_id, |session| session.index_path.clone())?;
        self.indexer.rebuild(&index_path, &chunks).await?;

        let sources: Vec<SourceMetadata> = fetched
            .into_iter()
            .map(|source| source.metadata)
            .collect();
        self.sessions.with_session(session_id, |session| {
            session.processed_sources = sources.clone();
        })?;

        info!(
            session_id,
            sources = sources.len(),
            skipped = skipped.len(),
            chunks = chunks.len(),
            "processing run complete"
        );
        Ok(ProcessingReport {
            sources,
            skipped,
            chunks_indexed: chunks.len(),
        })
    }

    /// Answers a question with retrieval-augmented context.
    ///
    /// Short-circuits with a fixed message, without invoking the model,
    /// when no index exists or nothing clears the similarity threshold. A
    /// model failure degrades to an inline error string; the memory window
    /// is only updated on success.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::InvalidInput("question is empty".to_string()));
        }

        let (index_path, memory_window) = self.sessions.with_session(session_id, |session| {
            (session.index_path.clone(), session.memory_window().to_vec())
        })?;

        let Some(store) = self.indexer.open_existing(&index_path).await? else {
            return Ok(Answer {
                text: NO_CONTENT_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        };

        let outcome = self
            .retriever
            .retrieve(&store, question, self.config.max_results)
            .await?;
        let hits = match outcome {
            RetrievalOutcome::NoContext => {
                return Ok(Answer {
                    text: NO_RELEVANT_CONTENT_MESSAGE.to_string(),
                    sources: Vec::new(),
                });
            }
            RetrievalOutcome::Hits(hits) => hits,
        };

        let context = format_context(&hits);
        self.sessions.with_session(session_id, |session| {
            session
                .conversation_history
                .push(QAExchange::new(question, &context));
        })?;

        let sources: Vec<String> = hits.iter().map(|hit| hit.source.clone()).collect();
        match self
            .generator
            .answer(question, &hits, &memory_window, self.config.temperature)
            .await
        {
            Ok(text) => {
                self.sessions.with_session(session_id, |session| {
                    session.memory.push(ChatMessage::user(question));
                    session.memory.push(ChatMessage::assistant(&text));
                })?;
                Ok(Answer { text, sources })
            }
            Err(AssistantError::Generation(message)) => Ok(Answer {
                text: format!("{GENERATION_ERROR_PREFIX} {message}"),
                sources,
            }),
            Err(other) => Err(other),
        }
    }

    /// Whole-index summary report over a sample of stored chunks.
    pub async fn summary_report(&self, session_id: &str) -> Result<String, AssistantError> {
        let index_path =
            self.sessions
                .with_session(session_id, |session| session.index_path.clone())?;
        let Some(store) = self.indexer.open_existing(&index_path).await? else {
            return Ok(EMPTY_REPORT_MESSAGE.to_string());
        };
        let chunks = store.sample(REPORT_SAMPLE_LIMIT).await?;
        if chunks.is_empty() {
            return Ok(EMPTY_REPORT_MESSAGE.to_string());
        }
        match self.generator.summary_report(&chunks).await {
            Ok(report) => Ok(report),
            Err(AssistantError::Generation(message)) => {
                Ok(format!("Error generating report: {message}"))
            }
            Err(other) => Err(other),
        }
    }

    /// Local word-frequency analysis for the topic view; no model call.
    /// An absent index yields an empty ranking.
    pub async fn topic_analysis(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, usize)>, AssistantError> {
        let index_path =
            self.sessions
                .with_session(session_id, |session| session.index_path.clone())?;
        let Some(store) = self.indexer.open_existing(&index_path).await? else {
            return Ok(Vec::new());
        };
        let chunks = store.sample(REPORT_SAMPLE_LIMIT).await?;
        Ok(topic_frequencies(&chunks))
    }

    /// Exports the session's conversation history as JSON.
    pub fn export_history(&self, session_id: &str) -> Result<String, AssistantError> {
        let history = self
            .sessions
            .with_session(session_id, |session| session.conversation_history.clone())?;
        export::history_to_json(&history)
    }
}
