//! Content retrieval: URL filtering, page fetching, and text upload.

pub mod loader;
pub mod metadata;

pub use loader::{BROWSER_USER_AGENT, FETCH_TIMEOUT, HttpPageLoader, PageLoader, WebDriverPageLoader};
pub use metadata::{NO_DESCRIPTION, UNTITLED, extract_metadata, extract_text};

use tracing::warn;
use url::Url;

use crate::types::{AssistantError, SourceMetadata, SourceOrigin};

/// Scheme prefixes accepted for candidate URLs.
pub const ACCEPTED_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Description recorded for uploaded files.
pub const UPLOADED_DESCRIPTION: &str = "Uploaded text content";

/// One fetched source: its metadata record plus the text to chunk.
///
/// `body` is `None` when the fetch failed; the metadata record then carries
/// the error text and the source contributes nothing to the index.
#[derive(Clone, Debug)]
pub struct FetchedSource {
    pub metadata: SourceMetadata,
    pub body: Option<String>,
}

/// Candidate filtering outcome: accepted URLs plus per-entry skip warnings.
#[derive(Clone, Debug, Default)]
pub struct SourcePartition {
    pub accepted: Vec<Url>,
    pub skipped: Vec<String>,
}

/// Filters candidate strings down to usable URLs.
///
/// Blank entries are ignored outright. Entries that do not start with an
/// accepted scheme, or do not parse as URLs, each produce one non-fatal skip
/// warning.
pub fn partition_candidates<S: AsRef<str>>(candidates: &[S]) -> SourcePartition {
    let mut partition = SourcePartition::default();
    for candidate in candidates {
        let raw = candidate.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        let has_scheme = ACCEPTED_SCHEMES
            .iter()
            .any(|scheme| raw.starts_with(scheme));
        if !has_scheme {
            warn!(candidate = raw, "skipping invalid URL");
            partition.skipped.push(raw.to_string());
            continue;
        }
        match Url::parse(raw) {
            Ok(url) => partition.accepted.push(url),
            Err(err) => {
                warn!(candidate = raw, error = %err, "skipping unparseable URL");
                partition.skipped.push(raw.to_string());
            }
        }
    }
    partition
}

/// Fetches each accepted URL in order.
///
/// A failure for one URL degrades to a placeholder metadata record with the
/// error text embedded in its description; the batch continues.
pub async fn fetch_sources(loader: &dyn PageLoader, urls: &[Url]) -> Vec<FetchedSource> {
    let mut sources = Vec::with_capacity(urls.len());
    for url in urls {
        match loader.load(url).await {
            Ok(html) => {
                let meta = metadata::extract_metadata(&html, url);
                let body = metadata::extract_text(&html);
                sources.push(FetchedSource {
                    metadata: meta,
                    body: Some(body),
                });
            }
            Err(err) => {
                warn!(%url, error = %err, "fetch failed, recording placeholder metadata");
                sources.push(FetchedSource {
                    metadata: metadata::error_metadata(url, &err),
                    body: None,
                });
            }
        }
    }
    sources
}

/// Builds the JS-rendering loader for a configured WebDriver endpoint.
pub fn rendered_loader(webdriver_url: &str) -> Result<WebDriverPageLoader, AssistantError> {
    let endpoint = Url::parse(webdriver_url).map_err(|err| {
        AssistantError::InvalidInput(format!("invalid WebDriver endpoint '{webdriver_url}': {err}"))
    })?;
    WebDriverPageLoader::new(&endpoint)
}

/// Decodes an uploaded text file into a single synthetic source.
pub fn upload_text(file_name: &str, bytes: &[u8]) -> Result<FetchedSource, AssistantError> {
    let content = std::str::from_utf8(bytes).map_err(|err| {
        AssistantError::InvalidInput(format!("uploaded file is not valid UTF-8: {err}"))
    })?;
    let metadata = SourceMetadata::new(
        file_name,
        UPLOADED_DESCRIPTION,
        SourceOrigin::LocalFile {
            name: file_name.to_string(),
        },
    );
    Ok(FetchedSource {
        metadata,
        body: Some(content.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_skips_invalid_scheme_with_one_warning() {
        let partition = partition_candidates(&["not-a-url", "https://example.com/article"]);
        assert_eq!(partition.accepted.len(), 1);
        assert_eq!(partition.skipped, vec!["not-a-url".to_string()]);
    }

    #[test]
    fn partition_ignores_blank_entries_silently() {
        let partition = partition_candidates(&["", "   ", "http://example.com"]);
        assert_eq!(partition.accepted.len(), 1);
        assert!(partition.skipped.is_empty());
    }

    #[test]
    fn partition_rejects_other_schemes() {
        let partition = partition_candidates(&["ftp://example.com/file", "file:///etc/hosts"]);
        assert!(partition.accepted.is_empty());
        assert_eq!(partition.skipped.len(), 2);
    }

    #[test]
    fn upload_produces_synthetic_metadata() {
        let source = upload_text("notes.txt", "some uploaded text".as_bytes()).unwrap();
        assert_eq!(source.metadata.title, "notes.txt");
        assert_eq!(source.metadata.description, UPLOADED_DESCRIPTION);
        assert_eq!(
            source.metadata.origin,
            SourceOrigin::LocalFile {
                name: "notes.txt".to_string()
            }
        );
        assert_eq!(source.body.as_deref(), Some("some uploaded text"));
    }

    #[test]
    fn upload_rejects_non_utf8() {
        let err = upload_text("data.bin", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, AssistantError::InvalidInput(_)));
    }
}
