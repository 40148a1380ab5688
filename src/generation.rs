//! Prompt composition and hosted chat completion.
//!
//! [`ChatModel`] is the seam between prompt logic and the provider SDK:
//! [`RigChatModel`] adapts any rig completion model, and
//! [`ScriptedChatModel`] drives the test suite without network access. The
//! [`ResponseGenerator`] owns the prompts: grounded question answering over
//! retrieved excerpts, and the whole-index summary report.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel};

use crate::message::ChatMessage;
use crate::retrieval::RetrievedChunk;
use crate::stores::IndexedChunk;
use crate::types::AssistantError;

/// Fixed output budget for every chat completion.
pub const MAX_OUTPUT_TOKENS: u64 = 2048;

/// Output budget for the credential probe call.
pub const CREDENTIAL_PROBE_TOKENS: u64 = 5;

/// Temperature used for the summary report, independent of the
/// user-configured answer temperature.
pub const SUMMARY_TEMPERATURE: f64 = 0.3;

/// Prefix of the inline string returned when a completion call fails.
pub const GENERATION_ERROR_PREFIX: &str = "Error generating response:";

const ANSWER_PREAMBLE: &str = "You are a research assistant. Ground every answer in the \
     provided source excerpts and cite the sources you draw on. If the excerpts do not \
     contain the answer, say so instead of speculating.";

/// One chat-completion request: a single user message plus call parameters.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub preamble: Option<String>,
    pub message: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

/// Minimal chat-completion contract the generator depends on.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, AssistantError>;
}

/// Adapter from the rig completion API to [`ChatModel`].
#[derive(Clone)]
pub struct RigChatModel<M> {
    model: M,
}

impl<M> RigChatModel<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M> ChatModel for RigChatModel<M>
where
    M: CompletionModel + Send + Sync,
{
    async fn complete(&self, request: ChatRequest) -> Result<String, AssistantError> {
        let mut builder = self
            .model
            .completion_request(rig::completion::Message::user(request.message))
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);
        if let Some(preamble) = request.preamble {
            builder = builder.preamble(preamble);
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|err| AssistantError::Generation(err.to_string()))?;

        let text = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            Err(AssistantError::Generation(
                "model returned no text content".to_string(),
            ))
        } else {
            Ok(text)
        }
    }
}

/// Composes prompts and invokes the chat model.
#[derive(Clone)]
pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Low-cost test call used to validate a freshly entered credential.
    pub async fn probe(&self) -> Result<(), AssistantError> {
        let request = ChatRequest {
            preamble: None,
            message: "Hi".to_string(),
            temperature: 0.0,
            max_tokens: CREDENTIAL_PROBE_TOKENS,
        };
        self.model.complete(request).await.map(|_| ())
    }

    /// Answers a question against retrieved context and the recent-memory
    /// window. Fails with a `Generation` error on any model failure; the
    /// caller decides how to degrade.
    pub async fn answer(
        &self,
        question: &str,
        context: &[RetrievedChunk],
        memory_window: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, AssistantError> {
        let request = ChatRequest {
            preamble: Some(ANSWER_PREAMBLE.to_string()),
            message: compose_answer_prompt(question, context, memory_window),
            temperature,
            max_tokens: MAX_OUTPUT_TOKENS,
        };
        self.model.complete(request).await
    }

    /// Whole-index summary: themes, notable facts, and sentiment over a
    /// sample of stored chunks. No retrieval step.
    pub async fn summary_report(
        &self,
        chunks: &[IndexedChunk],
    ) -> Result<String, AssistantError> {
        let combined = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let message = format!(
            "Analyze the following text content and provide a comprehensive summary report.\n\n\
             Content:\n{combined}\n\n\
             Please provide:\n\
             1. Key themes and topics covered\n\
             2. Notable facts or statistics mentioned\n\
             3. Overall sentiment analysis\n\n\
             Format your response with clear headings for each section."
        );
        let request = ChatRequest {
            preamble: None,
            message,
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        };
        self.model.complete(request).await
    }
}

/// Formats retrieval hits into the context block shared by the prompt and
/// the exported conversation history.
pub fn format_context(hits: &[RetrievedChunk]) -> String {
    hits.iter()
        .map(|hit| format!("Source: {}\nContent: {}", hit.source, hit.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn compose_answer_prompt(
    question: &str,
    context: &[RetrievedChunk],
    memory_window: &[ChatMessage],
) -> String {
    let history = memory_window
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Previous conversation:\n{history}\n\n\
         Relevant content excerpts:\n{context}\n\n\
         New question: {question}\n\n\
         Provide a detailed answer citing sources where appropriate.",
        context = format_context(context),
    )
}

/// Local word-frequency analysis over stored chunks: drops words shorter
/// than 4 characters or containing non-alphabetic characters, returns the
/// top 10 by frequency. Requires no model call.
pub fn topic_frequencies(chunks: &[IndexedChunk]) -> Vec<(String, usize)> {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for chunk in chunks {
        for word in chunk.content.split_whitespace() {
            if word.chars().count() < 4 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(word, count)| (word.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(10);
    ranked
}

/// Chat model with canned replies, for tests and offline runs.
///
/// Replies are consumed in order; when the script runs dry the last entry
/// repeats. An `Err` entry simulates a provider failure with that message.
#[derive(Default)]
pub struct ScriptedChatModel {
    replies: parking_lot::Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedChatModel {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: parking_lot::Mutex::new(
                replies.into_iter().map(|r| Ok(r.into())).collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    /// A model whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            replies: parking_lot::Mutex::new(VecDeque::from([Err(message.into())])),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completion calls issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _request: ChatRequest) -> Result<String, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AssistantError::Generation(message)),
            None => Err(AssistantError::Generation(
                "scripted model has no replies".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source: source.to_string(),
            similarity: 0.9,
        }
    }

    fn chunk(content: &str) -> IndexedChunk {
        IndexedChunk {
            id: "id".to_string(),
            source: "https://example.com".to_string(),
            chunk_index: 0,
            content: content.to_string(),
        }
    }

    #[test]
    fn context_block_tags_each_source() {
        let block = format_context(&[
            hit("https://example.com/a", "alpha text"),
            hit("local_file:notes.txt", "beta text"),
        ]);
        assert_eq!(
            block,
            "Source: https://example.com/a\nContent: alpha text\n\n\
             Source: local_file:notes.txt\nContent: beta text"
        );
    }

    #[test]
    fn answer_prompt_includes_history_context_and_question() {
        let prompt = compose_answer_prompt(
            "What changed?",
            &[hit("https://example.com/a", "the numbers moved")],
            &[
                ChatMessage::user("earlier question"),
                ChatMessage::assistant("earlier answer"),
            ],
        );
        assert!(prompt.contains("user: earlier question"));
        assert!(prompt.contains("assistant: earlier answer"));
        assert!(prompt.contains("Source: https://example.com/a"));
        assert!(prompt.contains("New question: What changed?"));
    }

    #[tokio::test]
    async fn scripted_model_replays_and_counts() {
        let model = ScriptedChatModel::with_replies(["first", "second"]);
        let request = ChatRequest {
            preamble: None,
            message: "q".to_string(),
            temperature: 0.0,
            max_tokens: 16,
        };
        assert_eq!(model.complete(request.clone()).await.unwrap(), "first");
        assert_eq!(model.complete(request.clone()).await.unwrap(), "second");
        // Last reply repeats once the script runs dry.
        assert_eq!(model.complete(request).await.unwrap(), "second");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn failing_model_surfaces_generation_error() {
        let model = ScriptedChatModel::failing("invalid api key");
        let err = model
            .complete(ChatRequest {
                preamble: None,
                message: "q".to_string(),
                temperature: 0.0,
                max_tokens: 16,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Generation(_)));
    }

    #[test]
    fn topic_frequencies_filters_and_ranks() {
        let chunks = vec![
            chunk("markets markets markets rally today today cat a1b2 it"),
            chunk("rally rally with markets"),
        ];
        let ranked = topic_frequencies(&chunks);
        assert_eq!(ranked[0], ("markets".to_string(), 4));
        assert_eq!(ranked[1], ("rally".to_string(), 3));
        // "cat" (3 chars), "a1b2" (non-alphabetic), "it" all filtered out.
        assert!(ranked.iter().all(|(word, _)| word.len() >= 4));
        assert!(!ranked.iter().any(|(word, _)| word == "a1b2"));
    }

    #[test]
    fn topic_frequencies_caps_at_ten() {
        let text: String = (0..15u8)
            .map(|i| format!("word{} ", (b'a' + i) as char).repeat(usize::from(i) + 1))
            .collect();
        let ranked = topic_frequencies(&[chunk(&text)]);
        assert_eq!(ranked.len(), 10);
    }
}
