//! Export surfaces: conversation history as JSON, reports as Markdown.

use chrono::Utc;

use crate::types::{AssistantError, QAExchange};

/// Serializes the conversation history as a JSON array of
/// `{question, context, timestamp}` records, in order.
pub fn history_to_json(history: &[QAExchange]) -> Result<String, AssistantError> {
    serde_json::to_string_pretty(history)
        .map_err(|err| AssistantError::InvalidInput(format!("history serialization failed: {err}")))
}

/// Parses a previously exported history document.
pub fn history_from_json(json: &str) -> Result<Vec<QAExchange>, AssistantError> {
    serde_json::from_str(json)
        .map_err(|err| AssistantError::InvalidInput(format!("history parse failed: {err}")))
}

/// Wraps a generated report body into a downloadable Markdown document.
pub fn report_to_markdown(title: &str, body: &str) -> String {
    format!(
        "# {title}\n\n_Generated {}_\n\n{body}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
