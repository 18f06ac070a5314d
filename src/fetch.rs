//! Fetching image bytes
//!
//! This module provides a trait-based abstraction for fetching image bytes
//! over the network. The loader stays agnostic about how bytes are
//! retrieved, enabling:
//!
//! - Mocking for tests
//! - Offline modes
//! - Custom transports
//!
//! The default implementation, [`HttpFetcher`], issues one GET per call via
//! `reqwest`. A non-2xx status is not an error at this layer: the status and
//! body come back untouched in [`FetchResponse`] and the caller decides.

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default User-Agent string used by [`HttpFetcher`]
pub const DEFAULT_USER_AGENT: &str = "imgloader/0.1";

/// Default Accept-Language header value
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Result of fetching image bytes
#[derive(Debug, Clone)]
pub struct FetchResponse {
  /// HTTP status code
  pub status: u16,
  /// Raw response body
  pub bytes: Bytes,
  /// Content-Type header value, if available (e.g. "image/png")
  pub content_type: Option<String>,
}

impl FetchResponse {
  pub fn new(status: u16, bytes: Bytes, content_type: Option<String>) -> Self {
    Self {
      status,
      bytes,
      content_type,
    }
  }

  /// Whether the status is in the 200–299 success range.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Check if this response appears to be an image based on content-type
  pub fn is_image(&self) -> bool {
    self
      .content_type
      .as_ref()
      .map(|ct| ct.starts_with("image/"))
      .unwrap_or(false)
  }
}

/// Trait for fetching image bytes
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a fetcher can be shared across
/// loaders and load tasks.
#[async_trait]
pub trait FetchClient: Send + Sync {
  /// Issue one GET for `url` and return the status plus body.
  ///
  /// Transport-level failures (connection, DNS, TLS, timeout) are errors;
  /// a response with a non-success status is not.
  async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

// Allow Arc<dyn FetchClient> to be used as FetchClient
#[async_trait]
impl<T: FetchClient + ?Sized> FetchClient for Arc<T> {
  async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
    (**self).fetch(url).await
  }
}

/// Default HTTP fetcher
///
/// Fetches over HTTP/HTTPS with configurable timeout, User-Agent,
/// Accept-Language and response size limit. Redirects are followed by the
/// underlying client.
///
/// # Example
///
/// ```rust,ignore
/// use imgloader::fetch::HttpFetcher;
/// use std::time::Duration;
///
/// let fetcher = HttpFetcher::new()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("MyApp/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  timeout: Duration,
  user_agent: String,
  accept_language: String,
  max_size: usize,
}

impl Default for HttpFetcher {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
      max_size: 64 * 1024 * 1024,
    }
  }
}

impl HttpFetcher {
  /// Create a new HttpFetcher with default settings
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the request timeout
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Set the User-Agent header
  pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
    self.user_agent = user_agent.into();
    self
  }

  /// Set the Accept-Language header
  pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
    self.accept_language = accept_language.into();
    self
  }

  /// Set the maximum response size in bytes. `0` disables the limit.
  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size;
    self
  }

  fn classify(&self, url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
      FetchError::Timeout {
        url: url.to_string(),
      }
    } else {
      FetchError::Transport {
        url: url.to_string(),
        reason: err.to_string(),
      }
    }
  }
}

#[async_trait]
impl FetchClient for HttpFetcher {
  async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(self.timeout)
      .user_agent(&self.user_agent)
      .build()
      .map_err(|e| FetchError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
      })?;

    let response = client
      .get(url.clone())
      .header("Accept-Language", &self.accept_language)
      .send()
      .await
      .map_err(|e| self.classify(url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|h| h.to_str().ok())
      .map(|s| s.to_string());

    let bytes = response.bytes().await.map_err(|e| self.classify(url, e))?;
    if self.max_size > 0 && bytes.len() > self.max_size {
      return Err(FetchError::TooLarge {
        url: url.to_string(),
        size: bytes.len(),
        limit: self.max_size,
      });
    }

    Ok(FetchResponse::new(status, bytes, content_type))
  }
}
