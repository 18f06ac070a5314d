//! Retry policy
//!
//! Deterministic retry accounting for load sequences: a fixed attempt
//! budget and a fixed linear backoff. The delays are part of the contract
//! (tests depend on them), so this is intentionally not jittered and not
//! exponential.

use std::time::Duration;

/// Retry policy for a load sequence
///
/// Attempts are counted from 1. After attempt `n` fails, the loader sleeps
/// [`delay(n)`](RetryPolicy::delay) before attempt `n + 1`: 300 ms before
/// attempt 2, 600 ms before attempt 3 with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempt budget for one sequence.
  pub max_attempts: u32,
  /// Base backoff; the sleep after attempt `n` is `backoff_base * n`.
  pub backoff_base: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      backoff_base: Duration::from_millis(300),
    }
  }
}

impl RetryPolicy {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts;
    self
  }

  pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
    self.backoff_base = backoff_base;
    self
  }

  /// Whether another attempt follows after attempt `attempt` failed.
  pub fn should_retry(&self, attempt: u32) -> bool {
    attempt < self.max_attempts
  }

  /// Backoff to sleep after attempt `attempt` failed.
  pub fn delay(&self, attempt: u32) -> Duration {
    self.backoff_base * attempt
  }
}
