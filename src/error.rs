//! Error types for imgloader
//!
//! This module provides error types for the two fallible subsystems:
//! - Fetch errors (transport failures, bad statuses, timeouts)
//! - Decode errors (malformed bytes, decode limits)
//!
//! All errors use the `thiserror` crate for minimal boilerplate and
//! proper error trait implementations. Nothing in this crate treats an
//! error as fatal: every failure degrades to the loader's `Failed` state.

use thiserror::Error;

/// Result type alias for imgloader operations
///
/// This is a convenience type that uses our Error type as the error variant.
///
/// # Examples
///
/// ```
/// use imgloader::Result;
///
/// fn check_bytes(bytes: &[u8]) -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for imgloader
///
/// Each variant wraps a more specific error type for that subsystem.
/// Within a load sequence both variants are treated as the same retryable
/// failure; the distinction exists for logging and for callers that use
/// the fetch/decode layers directly.
#[derive(Error, Debug, Clone)]
pub enum Error {
  /// Fetching the image bytes failed
  #[error("Fetch error: {0}")]
  Fetch(#[from] FetchError),

  /// Decoding the fetched bytes failed
  #[error("Decode error: {0}")]
  Decode(#[from] DecodeError),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

/// Errors that occur while fetching image bytes
///
/// A non-2xx status is reported through [`FetchError::Status`] by callers
/// that inspect the response; the transport itself returns the status and
/// body untouched.
///
/// # Examples
///
/// ```
/// use imgloader::error::FetchError;
///
/// let error = FetchError::Status {
///     url: "https://example.com/avatar.png".to_string(),
///     status: 404,
/// };
/// ```
#[derive(Error, Debug, Clone)]
pub enum FetchError {
  /// Transport-level failure (connection refused, DNS, TLS, ...)
  #[error("Transport error fetching '{url}': {reason}")]
  Transport { url: String, reason: String },

  /// Response status outside the success range
  #[error("Unexpected status {status} fetching '{url}'")]
  Status { url: String, status: u16 },

  /// The per-attempt timeout elapsed before a response arrived
  #[error("Timed out fetching '{url}'")]
  Timeout { url: String },

  /// Response body exceeded the configured size limit
  #[error("Response for '{url}' too large ({size} > {limit} bytes)")]
  TooLarge {
    url: String,
    size: usize,
    limit: usize,
  },
}

/// Errors that occur while decoding fetched bytes into pixels
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
  /// The bytes are not a decodable image
  #[error("Failed to decode image: {reason}")]
  Malformed { reason: String },

  /// The decoded image would exceed the configured limits
  #[error("Decoded image too large: {width}x{height} ({reason})")]
  TooLarge {
    width: u32,
    height: u32,
    reason: String,
  },
}
