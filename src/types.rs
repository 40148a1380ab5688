//! Shared data types and the crate-wide error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum length of a stored title or description before truncation.
pub const METADATA_FIELD_LIMIT: usize = 200;

/// Marker appended to truncated metadata fields.
pub const TRUNCATION_MARKER: &str = "...";

/// Error taxonomy for the assistant pipeline.
///
/// The five variants map one-to-one onto the failure categories callers need
/// to distinguish when deciding user-facing presentation: credential problems
/// block model-dependent operations until a new key is supplied, fetch and
/// generation failures degrade to placeholder output, index failures abort
/// the current processing action, and input validation failures are rejected
/// before any network activity.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Invalid or missing API credential.
    #[error("credential error: {0}")]
    Credential(String),

    /// Network or parse failure while retrieving a source.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Chat-completion or embedding call failure.
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem or vector-store failure during index delete/rebuild.
    #[error("index error: {0}")]
    Index(String),

    /// Input rejected before any processing started.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AssistantError {
    /// The bare failure message, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Credential(msg)
            | Self::Fetch(msg)
            | Self::Generation(msg)
            | Self::Index(msg)
            | Self::InvalidInput(msg) => msg,
        }
    }
}

// Filesystem operations in this crate are index-path operations.
impl From<std::io::Error> for AssistantError {
    fn from(err: std::io::Error) -> Self {
        AssistantError::Index(err.to_string())
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Fetch(err.to_string())
    }
}

/// Where a piece of source content came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOrigin {
    /// Fetched from the web.
    Url(Url),
    /// Uploaded as a local text file.
    LocalFile { name: String },
}

impl SourceOrigin {
    /// Stable string form used for chunk back-references and source tags.
    pub fn as_reference(&self) -> String {
        match self {
            SourceOrigin::Url(url) => url.to_string(),
            SourceOrigin::LocalFile { name } => format!("local_file:{name}"),
        }
    }
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_reference())
    }
}

/// Metadata describing one successfully registered source.
///
/// Immutable once created; the title and description are truncated to
/// [`METADATA_FIELD_LIMIT`] characters at construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub title: String,
    pub description: String,
    pub origin: SourceOrigin,
    pub fetched_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Builds a record, applying field truncation.
    pub fn new(title: impl Into<String>, description: impl Into<String>, origin: SourceOrigin) -> Self {
        Self {
            title: truncate_field(&title.into()),
            description: truncate_field(&description.into()),
            origin,
            fetched_at: Utc::now(),
        }
    }
}

/// One question/answer round, retained for the exportable history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QAExchange {
    pub question: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

impl QAExchange {
    pub fn new(question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Truncates a metadata field to [`METADATA_FIELD_LIMIT`] characters,
/// appending [`TRUNCATION_MARKER`] when anything was cut. Fields at or under
/// the limit are returned unmodified.
pub fn truncate_field(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(METADATA_FIELD_LIMIT).collect();
    if chars.next().is_some() {
        format!("{head}{TRUNCATION_MARKER}")
    } else {
        head
    }
}
