//! Load orchestration
//!
//! `ImageLoader` drives one logical "load image for URL X" request: it
//! checks the shared cache, runs retried fetch+decode attempts, publishes
//! state transitions through a `watch` channel, and supports cancellation
//! and URL rebinding.
//!
//! Each visual element (the Binding) owns exactly one loader, calls
//! [`load`](ImageLoader::load) on appearance or URL change and
//! [`cancel`](ImageLoader::cancel) on disappearance, and renders from the
//! published [`LoadState`]:
//!
//! ```rust,no_run
//! # use imgloader::{ImageCache, ImageLoader, HttpFetcher};
//! # use std::sync::Arc;
//! # async fn bind(url: url::Url) {
//! let cache = Arc::new(ImageCache::new());
//! let mut loader = ImageLoader::new(cache, Arc::new(HttpFetcher::new()));
//! let mut states = loader.subscribe();
//!
//! loader.load(Some(url));
//! while states.changed().await.is_ok() {
//!     let state = states.borrow_and_update().clone();
//!     match (state.image(), state.is_loading()) {
//!         (Some(_image), _) => { /* draw the image */ }
//!         (None, true) => { /* draw a spinner */ }
//!         (None, false) => { /* draw the placeholder */ }
//!     }
//! }
//! # }
//! ```
//!
//! Failures never escape this module: transport errors, bad statuses,
//! timeouts and decode failures all share one retry budget and degrade to
//! [`LoadState::Failed`] when it is exhausted.

use crate::cache::ImageCache;
use crate::decode::{decode, DecodeConfig, DecodedImage};
use crate::error::{Error, FetchError};
use crate::fetch::FetchClient;
use crate::retry::RetryPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Published state of one loader
///
/// Transitions are strictly ordered per loader:
/// `Idle → Loading(1) → … → Loading(n) → {Loaded, Failed}`, with any state
/// returning to `Idle` on cancellation. `Loaded` and `Failed` are only ever
/// reached from `Loading`.
#[derive(Debug, Clone)]
pub enum LoadState {
  /// Nothing requested, or the last request was cancelled.
  Idle,
  /// A sequence is running; `attempt` counts from 1.
  Loading { attempt: u32 },
  /// The image is ready.
  Loaded(DecodedImage),
  /// Every attempt failed; render a placeholder.
  Failed,
}

impl LoadState {
  /// The image to render, if any.
  pub fn image(&self) -> Option<&DecodedImage> {
    match self {
      LoadState::Loaded(image) => Some(image),
      _ => None,
    }
  }

  /// Whether a spinner should be shown.
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading { .. })
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, LoadState::Failed)
  }

  pub fn is_idle(&self) -> bool {
    matches!(self, LoadState::Idle)
  }
}

/// Configuration for [`ImageLoader`]
#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
  /// Hard upper bound per fetch attempt; exceeding it is a retryable failure.
  pub fetch_timeout: Duration,
  /// Attempt budget and backoff schedule.
  pub retry: RetryPolicy,
  /// Decode limits applied to fetched bytes.
  pub decode: DecodeConfig,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      fetch_timeout: Duration::from_secs(30),
      retry: RetryPolicy::default(),
      decode: DecodeConfig::default(),
    }
  }
}

impl LoaderConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_decode_config(mut self, decode: DecodeConfig) -> Self {
    self.decode = decode;
    self
  }
}

struct Sequence {
  token: CancellationToken,
}

/// Orchestrates loading one image URL at a time
///
/// Owned exclusively by its Binding; shares nothing with other loaders
/// except the injected [`ImageCache`]. `load` must be called from within a
/// tokio runtime (a task is spawned per cache-missing sequence).
pub struct ImageLoader {
  cache: Arc<ImageCache>,
  fetcher: Arc<dyn FetchClient>,
  config: LoaderConfig,
  state_tx: watch::Sender<LoadState>,
  // Bumped before any new sequence starts; a task publishes only while its
  // captured generation is still current.
  generation: Arc<AtomicU64>,
  sequence: Option<Sequence>,
}

impl ImageLoader {
  /// Create a loader with the default configuration.
  pub fn new(cache: Arc<ImageCache>, fetcher: Arc<dyn FetchClient>) -> Self {
    Self::with_config(cache, fetcher, LoaderConfig::default())
  }

  /// Create a loader with a custom configuration.
  pub fn with_config(
    cache: Arc<ImageCache>,
    fetcher: Arc<dyn FetchClient>,
    config: LoaderConfig,
  ) -> Self {
    let (state_tx, _) = watch::channel(LoadState::Idle);
    Self {
      cache,
      fetcher,
      config,
      state_tx,
      generation: Arc::new(AtomicU64::new(0)),
      sequence: None,
    }
  }

  /// Subscribe to state publications.
  ///
  /// The receiver always starts with the current state; per-loader
  /// publications are strictly ordered.
  pub fn subscribe(&self) -> watch::Receiver<LoadState> {
    self.state_tx.subscribe()
  }

  /// The current published state.
  pub fn state(&self) -> LoadState {
    self.state_tx.borrow().clone()
  }

  /// Load an image, superseding any previous request.
  ///
  /// - `None` cancels in-flight work and settles in `Idle`.
  /// - A cache hit publishes `Loaded` synchronously; no fetch is issued.
  /// - Otherwise `Loading(1)` is published and a fetch task starts.
  pub fn load(&mut self, url: Option<Url>) {
    let Some(url) = url else {
      self.cancel();
      return;
    };

    self.invalidate_current();

    if let Some(image) = self.cache.get(&url) {
      debug!(url = %url, "image cache hit");
      self.state_tx.send_replace(LoadState::Loaded(image));
      return;
    }

    debug!(url = %url, "image cache miss; starting load sequence");
    self.state_tx.send_replace(LoadState::Loading { attempt: 1 });

    let token = CancellationToken::new();
    let task = SequenceTask {
      url,
      cache: Arc::clone(&self.cache),
      fetcher: Arc::clone(&self.fetcher),
      config: self.config,
      token: token.clone(),
      state_tx: self.state_tx.clone(),
      generation: Arc::clone(&self.generation),
      gen_id: self.generation.load(Ordering::SeqCst),
    };
    tokio::spawn(task.run());
    self.sequence = Some(Sequence { token });
  }

  /// Stop any in-flight work and settle in `Idle`.
  ///
  /// Idempotent and safe from any state. The cancelled sequence publishes
  /// nothing further; the cache is left untouched.
  pub fn cancel(&mut self) {
    self.invalidate_current();
    self.state_tx.send_if_modified(|state| {
      if state.is_idle() {
        false
      } else {
        *state = LoadState::Idle;
        true
      }
    });
  }

  /// Invalidate the running sequence: bump the generation so its pending
  /// publications are discarded, then cancel its token so it stops at the
  /// next suspension point.
  fn invalidate_current(&mut self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    if let Some(sequence) = self.sequence.take() {
      sequence.token.cancel();
      debug!("load sequence cancelled");
    }
  }
}

impl Drop for ImageLoader {
  fn drop(&mut self) {
    if let Some(sequence) = self.sequence.take() {
      sequence.token.cancel();
    }
  }
}

struct SequenceTask {
  url: Url,
  cache: Arc<ImageCache>,
  fetcher: Arc<dyn FetchClient>,
  config: LoaderConfig,
  token: CancellationToken,
  state_tx: watch::Sender<LoadState>,
  generation: Arc<AtomicU64>,
  gen_id: u64,
}

impl SequenceTask {
  /// The attempt loop: fetch, decode, cache, publish; retry with linear
  /// backoff on any failure. Cancellation is observed before every side
  /// effect and at both suspension points (fetch and backoff sleep).
  async fn run(self) {
    let mut attempt: u32 = 1;
    loop {
      if self.token.is_cancelled() {
        return;
      }

      let fetched = tokio::select! {
        () = self.token.cancelled() => return,
        result = tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(&self.url)) => result,
      };

      let outcome: Result<DecodedImage, Error> = match fetched {
        Err(_elapsed) => Err(
          FetchError::Timeout {
            url: self.url.to_string(),
          }
          .into(),
        ),
        Ok(Err(err)) => Err(err.into()),
        Ok(Ok(response)) if !response.is_success() => Err(
          FetchError::Status {
            url: self.url.to_string(),
            status: response.status,
          }
          .into(),
        ),
        // Decode failures share the retry budget with fetch failures.
        Ok(Ok(response)) => decode(&response.bytes, &self.config.decode).map_err(Error::from),
      };

      match outcome {
        Ok(image) => {
          if self.token.is_cancelled() {
            return;
          }
          self.cache.put(self.url.clone(), image.clone(), image.cost());
          debug!(url = %self.url, attempt, "image loaded");
          self.publish(LoadState::Loaded(image));
          return;
        }
        Err(err) => {
          if self.config.retry.should_retry(attempt) {
            let backoff = self.config.retry.delay(attempt);
            warn!(
              url = %self.url,
              attempt,
              backoff_ms = backoff.as_millis() as u64,
              error = %err,
              "image load attempt failed; retrying"
            );
            tokio::select! {
              () = self.token.cancelled() => return,
              () = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
            if !self.publish(LoadState::Loading { attempt }) {
              return;
            }
          } else {
            warn!(url = %self.url, attempt, error = %err, "image load failed");
            self.publish(LoadState::Failed);
            return;
          }
        }
      }
    }
  }

  /// Publish a state unless this sequence has been superseded. The
  /// generation check runs inside the watch closure, so a stale sequence
  /// can never overwrite a newer one's publication.
  fn publish(&self, state: LoadState) -> bool {
    self.state_tx.send_if_modified(|slot| {
      if self.generation.load(Ordering::SeqCst) != self.gen_id {
        return false;
      }
      *slot = state;
      true
    })
  }
}
