use crate::quote::Quote;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

/// Category assigned to every quote that arrives from the remote source.
pub const SERVER_CATEGORY: &str = "Server";

const DEFAULT_LIMIT: usize = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB

/// Errors talking to the remote quote endpoint.
///
/// None of these are retried; the poller simply tries again on its next
/// tick.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body was not a JSON array of objects
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 1MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Somewhere quotes can be fetched from and announced to.
#[async_trait]
pub trait RemoteQuoteSource: Send + Sync {
    /// Fetch the current remote quote set.
    async fn fetch(&self) -> Result<Vec<Quote>, RemoteError>;

    /// Announce a locally added quote. The response carries no state.
    async fn publish(&self, quote: &Quote) -> Result<(), RemoteError>;
}

/// Entry shape served by the placeholder endpoint. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct RemotePost {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl RemotePost {
    fn into_text(self) -> Option<String> {
        let text = self.title.or(self.text)?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(rename = "userId")]
    user_id: u32,
}

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy limited to 3 hops with loop detection.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Build the shared HTTP client used for the remote endpoint.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

// ============================================================================
// HttpQuoteSource
// ============================================================================

/// Remote quote source backed by a JSON-over-HTTP endpoint.
///
/// `GET` is expected to return an array of objects; each object's `title`
/// (or `text`) becomes one quote in the server category. `POST` sends a new
/// quote as `{title, body, userId}` and only logs the response.
#[derive(Clone)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    endpoint: Url,
    category: String,
    limit: usize,
    timeout: Duration,
}

impl HttpQuoteSource {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            category: SERVER_CATEGORY.to_owned(),
            limit: DEFAULT_LIMIT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Category label given to fetched quotes.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Maximum number of entries taken from each fetch.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(RemoteError::Network)?;

        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteQuoteSource for HttpQuoteSource {
    async fn fetch(&self) -> Result<Vec<Quote>, RemoteError> {
        let response = self.send(self.client.get(self.endpoint.clone())).await?;
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;

        let posts: Vec<RemotePost> =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Parse(e.to_string()))?;
        let received = posts.len();

        let quotes: Vec<Quote> = posts
            .into_iter()
            .take(self.limit)
            .filter_map(RemotePost::into_text)
            .map(|text| Quote {
                text,
                category: self.category.clone(),
            })
            .collect();

        tracing::debug!(
            endpoint = %self.endpoint,
            received = received,
            mapped = quotes.len(),
            "Fetched remote quotes"
        );
        Ok(quotes)
    }

    async fn publish(&self, quote: &Quote) -> Result<(), RemoteError> {
        let body = serde_json::to_vec(&PublishBody {
            title: &quote.text,
            body: &quote.category,
            user_id: 1,
        })
        .map_err(|e| RemoteError::Parse(e.to_string()))?;

        let request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=UTF-8")
            .body(body);
        let response = self.send(request).await?;

        tracing::info!(
            endpoint = %self.endpoint,
            status = %response.status(),
            "Posted quote to server"
        );
        Ok(())
    }
}

/// Announce `quote` in the background. Failures are logged and dropped;
/// local state is never touched.
pub fn publish_detached(source: Arc<dyn RemoteQuoteSource>, quote: Quote) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = source.publish(&quote).await {
            tracing::warn!(error = %e, "Failed to post quote to server");
        }
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RemoteError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RemoteError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
