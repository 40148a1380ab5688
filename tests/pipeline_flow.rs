//! End-to-end pipeline tests with deterministic embeddings and a scripted
//! chat model, so no network or credential is required.

use std::sync::Arc;

use askforge::config::AssistantConfig;
use askforge::embeddings::{DeterministicEmbeddingModel, Embedder};
use askforge::export;
use askforge::fetch::HttpPageLoader;
use askforge::generation::{GENERATION_ERROR_PREFIX, ResponseGenerator, ScriptedChatModel};
use askforge::pipeline::{EMPTY_REPORT_MESSAGE, NO_CONTENT_MESSAGE, ResearchPipeline};
use askforge::types::AssistantError;
use tempfile::TempDir;

const UPLOAD_TEXT: &str = "Central banks raised rates again this quarter. Markets \
reacted with a broad selloff in growth stocks. Analysts expect rates volatility to \
continue through the year.";

struct Harness {
    _dir: TempDir,
    pipeline: ResearchPipeline<DeterministicEmbeddingModel>,
    chat: Arc<ScriptedChatModel>,
}

fn harness(chat: ScriptedChatModel) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = AssistantConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let chat = Arc::new(chat);
    let generator = ResponseGenerator::new(chat.clone());
    let loader = Arc::new(HttpPageLoader::new().unwrap());
    let pipeline = ResearchPipeline::new(
        config,
        loader,
        Embedder::new(DeterministicEmbeddingModel),
        generator,
    );
    Harness {
        _dir: dir,
        pipeline,
        chat,
    }
}

#[tokio::test]
async fn question_before_processing_skips_the_model() {
    let h = harness(ScriptedChatModel::with_replies(["should not be used"]));
    let session = h.pipeline.sessions().create();

    let answer = h.pipeline.ask(&session.id, "what happened?").await.unwrap();
    assert_eq!(answer.text, NO_CONTENT_MESSAGE);
    assert!(answer.sources.is_empty());
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn upload_process_and_ask_round_trip() {
    let h = harness(ScriptedChatModel::with_replies([
        "Rates went up and markets sold off.",
    ]));
    let session = h.pipeline.sessions().create();

    let report = h
        .pipeline
        .process_sources(&session.id, &[], Some(("market_notes.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].title, "market_notes.txt");
    assert!(report.chunks_indexed >= 1);
    assert!(report.skipped.is_empty());

    // Asking with the exact uploaded text guarantees a retrieval hit.
    let answer = h.pipeline.ask(&session.id, UPLOAD_TEXT).await.unwrap();
    assert_eq!(answer.text, "Rates went up and markets sold off.");
    assert!(!answer.sources.is_empty());
    assert_eq!(h.chat.calls(), 1);

    let snapshot = h.pipeline.sessions().get(&session.id).unwrap();
    assert_eq!(snapshot.conversation_history.len(), 1);
    assert_eq!(snapshot.conversation_history[0].question, UPLOAD_TEXT);
    assert_eq!(snapshot.memory.len(), 2);
    assert_eq!(snapshot.memory[0].content, UPLOAD_TEXT);
    assert_eq!(snapshot.memory[1].content, "Rates went up and markets sold off.");
}

#[tokio::test]
async fn model_failure_degrades_inline_and_preserves_memory() {
    let h = harness(ScriptedChatModel::failing("Incorrect API key provided"));
    let session = h.pipeline.sessions().create();

    h.pipeline
        .process_sources(&session.id, &[], Some(("notes.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();

    let answer = h.pipeline.ask(&session.id, UPLOAD_TEXT).await.unwrap();
    assert!(
        answer.text.starts_with(GENERATION_ERROR_PREFIX),
        "got: {}",
        answer.text
    );
    assert!(answer.text.contains("Incorrect API key provided"));

    let snapshot = h.pipeline.sessions().get(&session.id).unwrap();
    // The exchange is recorded in history, but the memory window is untouched.
    assert_eq!(snapshot.conversation_history.len(), 1);
    assert!(snapshot.memory.is_empty());
}

#[tokio::test]
async fn exported_history_round_trips() {
    let h = harness(ScriptedChatModel::with_replies(["first answer", "second answer"]));
    let session = h.pipeline.sessions().create();

    h.pipeline
        .process_sources(&session.id, &[], Some(("notes.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();
    h.pipeline.ask(&session.id, UPLOAD_TEXT).await.unwrap();
    h.pipeline.ask(&session.id, UPLOAD_TEXT).await.unwrap();

    let json = h.pipeline.export_history(&session.id).unwrap();
    let parsed = export::history_from_json(&json).unwrap();
    let snapshot = h.pipeline.sessions().get(&session.id).unwrap();
    assert_eq!(parsed, snapshot.conversation_history);
    assert_eq!(parsed.len(), 2);
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_work() {
    let h = harness(ScriptedChatModel::default());
    let session = h.pipeline.sessions().create();

    let err = h
        .pipeline
        .process_sources(&session.id, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::InvalidInput(_)));

    let err = h
        .pipeline
        .process_sources(&session.id, &["".to_string(), "  ".to_string()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::InvalidInput(_)));
}

#[tokio::test]
async fn reprocessing_replaces_sources_and_index() {
    let h = harness(ScriptedChatModel::with_replies(["answer"]));
    let session = h.pipeline.sessions().create();

    h.pipeline
        .process_sources(&session.id, &[], Some(("first.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();
    let report = h
        .pipeline
        .process_sources(
            &session.id,
            &[],
            Some(("second.txt", b"A short unrelated note about gardening seasons." as &[u8])),
        )
        .await
        .unwrap();

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].title, "second.txt");
    let snapshot = h.pipeline.sessions().get(&session.id).unwrap();
    assert_eq!(snapshot.processed_sources.len(), 1);
    assert_eq!(snapshot.processed_sources[0].title, "second.txt");
}

#[tokio::test]
async fn summary_report_without_content_skips_the_model() {
    let h = harness(ScriptedChatModel::with_replies(["unused"]));
    let session = h.pipeline.sessions().create();

    let report = h.pipeline.summary_report(&session.id).await.unwrap();
    assert_eq!(report, EMPTY_REPORT_MESSAGE);
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn summary_report_uses_stored_chunks() {
    let h = harness(ScriptedChatModel::with_replies(["## Themes\n\nrates and markets"]));
    let session = h.pipeline.sessions().create();

    h.pipeline
        .process_sources(&session.id, &[], Some(("notes.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();
    let report = h.pipeline.summary_report(&session.id).await.unwrap();
    assert_eq!(report, "## Themes\n\nrates and markets");
    assert_eq!(h.chat.calls(), 1);
}

#[tokio::test]
async fn topic_analysis_is_local_and_filtered() {
    let h = harness(ScriptedChatModel::default());
    let session = h.pipeline.sessions().create();

    let text = "markets markets markets rates rates gardening ab c3po";
    h.pipeline
        .process_sources(&session.id, &[], Some(("notes.txt", text.as_bytes())))
        .await
        .unwrap();

    let ranked = h.pipeline.topic_analysis(&session.id).await.unwrap();
    assert_eq!(ranked[0], ("markets".to_string(), 3));
    assert_eq!(ranked[1], ("rates".to_string(), 2));
    assert!(!ranked.iter().any(|(word, _)| word == "ab" || word == "c3po"));
    // Never a model call for topic analysis.
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn credential_probe_maps_failures_to_credential_errors() {
    let h = harness(ScriptedChatModel::failing("invalid_api_key"));
    let err = h.pipeline.validate_credential().await.unwrap_err();
    assert!(matches!(err, AssistantError::Credential(_)));

    let ok = harness(ScriptedChatModel::with_replies(["Hello!"]));
    ok.pipeline.validate_credential().await.unwrap();
}

#[tokio::test]
async fn reset_index_then_ask_gives_no_content() {
    let h = harness(ScriptedChatModel::with_replies(["answer"]));
    let session = h.pipeline.sessions().create();

    h.pipeline
        .process_sources(&session.id, &[], Some(("notes.txt", UPLOAD_TEXT.as_bytes())))
        .await
        .unwrap();
    h.pipeline.sessions().reset_index(&session.id).await.unwrap();
    // Idempotent second reset.
    h.pipeline.sessions().reset_index(&session.id).await.unwrap();

    let answer = h.pipeline.ask(&session.id, UPLOAD_TEXT).await.unwrap();
    assert_eq!(answer.text, NO_CONTENT_MESSAGE);
    let snapshot = h.pipeline.sessions().get(&session.id).unwrap();
    assert!(snapshot.processed_sources.is_empty());
}
