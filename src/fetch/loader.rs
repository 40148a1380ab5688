//! Page-loading strategies behind a common trait.
//!
//! [`HttpPageLoader`] performs a plain GET with a browser-like identifying
//! header. [`WebDriverPageLoader`] drives a W3C WebDriver endpoint (a local
//! chromedriver/geckodriver) so script-heavy pages are fetched after their
//! JavaScript has executed; it is selected by the `rendered_fetch` toggle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::types::AssistantError;

/// Identifying header sent with page fetches.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-page fetch timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves the raw document behind a URL.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &Url) -> Result<String, AssistantError>;
}

/// Plain HTTP fetch strategy.
#[derive(Clone, Debug)]
pub struct HttpPageLoader {
    client: Client,
}

impl HttpPageLoader {
    pub fn new() -> Result<Self, AssistantError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .use_rustls_tls()
            .build()?;
        Ok(Self { client })
    }

    /// Uses a preconfigured client (shared connection pool, test doubles).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(&self, url: &Url) -> Result<String, AssistantError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// JS-rendering fetch strategy speaking the W3C WebDriver protocol.
///
/// One driver session is created per page load and deleted afterwards:
/// `POST /session` → `POST /session/{id}/url` → `GET /session/{id}/source`
/// → `DELETE /session/{id}`. Requires an external driver process listening
/// on `endpoint`.
#[derive(Clone, Debug)]
pub struct WebDriverPageLoader {
    client: Client,
    base: String,
}

impl WebDriverPageLoader {
    pub fn new(endpoint: &Url) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .use_rustls_tls()
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: &Url) -> Self {
        Self {
            client,
            base: endpoint.as_str().trim_end_matches('/').to_string(),
        }
    }

    async fn open_session(&self) -> Result<String, AssistantError> {
        let body = json!({ "capabilities": { "alwaysMatch": {} } });
        let response: serde_json::Value = self
            .client
            .post(format!("{}/session", self.base))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response["value"]["sessionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                AssistantError::Fetch("webdriver response carried no session id".to_string())
            })
    }

    async fn navigate(&self, session_id: &str, url: &Url) -> Result<(), AssistantError> {
        self.client
            .post(format!("{}/session/{session_id}/url", self.base))
            .json(&json!({ "url": url.as_str() }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn page_source(&self, session_id: &str) -> Result<String, AssistantError> {
        let response: serde_json::Value = self
            .client
            .get(format!("{}/session/{session_id}/source", self.base))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response["value"].as_str().map(str::to_string).ok_or_else(|| {
            AssistantError::Fetch("webdriver response carried no page source".to_string())
        })
    }

    async fn close_session(&self, session_id: &str) {
        // Best effort; a leaked driver session is the driver's problem.
        let _ = self
            .client
            .delete(format!("{}/session/{session_id}", self.base))
            .send()
            .await;
    }
}

#[async_trait]
impl PageLoader for WebDriverPageLoader {
    async fn load(&self, url: &Url) -> Result<String, AssistantError> {
        let session_id = self.open_session().await?;
        debug!(%url, session_id, "webdriver session opened");
        let result = async {
            self.navigate(&session_id, url).await?;
            self.page_source(&session_id).await
        }
        .await;
        self.close_session(&session_id).await;
        result
    }
}
