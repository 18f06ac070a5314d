//! Image decoding
//!
//! Pure byte-to-pixels decoding with configurable limits. Decoding never
//! performs I/O and never panics on bad input; malformed or oversized
//! payloads are reported as [`DecodeError`] values.

use crate::error::DecodeError;
use image::DynamicImage;
use image::GenericImageView;
use image::ImageReader;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// A decoded in-memory image
///
/// Wraps the decoded pixel data behind an `Arc` so cache hits and state
/// publications share one allocation. The [`cost`](DecodedImage::cost) is
/// the accounting unit used to bound cache memory: an RGBA estimate of
/// `width * height * 4` bytes.
#[derive(Clone)]
pub struct DecodedImage {
  image: Arc<DynamicImage>,
  cost: usize,
}

impl DecodedImage {
  /// Wrap a decoded image, computing its resident cost.
  pub fn new(image: DynamicImage) -> Self {
    let (width, height) = image.dimensions();
    let cost = (width as usize)
      .saturating_mul(height as usize)
      .saturating_mul(4);
    Self {
      image: Arc::new(image),
      cost,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  /// Resident memory cost in bytes, used for cache accounting.
  pub fn cost(&self) -> usize {
    self.cost
  }

  /// Access the underlying decoded pixels.
  pub fn as_dynamic(&self) -> &DynamicImage {
    &self.image
  }

  /// Whether two handles refer to the same decoded allocation.
  pub fn ptr_eq(&self, other: &DecodedImage) -> bool {
    Arc::ptr_eq(&self.image, &other.image)
  }
}

impl fmt::Debug for DecodedImage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DecodedImage")
      .field("width", &self.width())
      .field("height", &self.height())
      .field("cost", &self.cost)
      .finish()
  }
}

/// Decode limits
///
/// Guards against pathological payloads before pixels are allocated.
/// `0` disables a limit.
#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
  /// Maximum number of decoded pixels (width * height). `0` disables the limit.
  pub max_decoded_pixels: u64,
  /// Maximum allowed width or height for a decoded image. `0` disables the limit.
  pub max_decoded_dimension: u32,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      max_decoded_pixels: 100_000_000,
      max_decoded_dimension: 32768,
    }
  }
}

impl DecodeConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_max_decoded_pixels(mut self, max: u64) -> Self {
    self.max_decoded_pixels = max;
    self
  }

  pub fn with_max_decoded_dimension(mut self, max: u32) -> Self {
    self.max_decoded_dimension = max;
    self
  }

  fn check(&self, width: u32, height: u32) -> Result<(), DecodeError> {
    if self.max_decoded_dimension > 0
      && (width > self.max_decoded_dimension || height > self.max_decoded_dimension)
    {
      return Err(DecodeError::TooLarge {
        width,
        height,
        reason: format!("dimension exceeds limit of {}", self.max_decoded_dimension),
      });
    }

    let pixels = (width as u64).saturating_mul(height as u64);
    if self.max_decoded_pixels > 0 && pixels > self.max_decoded_pixels {
      return Err(DecodeError::TooLarge {
        width,
        height,
        reason: format!("pixel count exceeds limit of {}", self.max_decoded_pixels),
      });
    }

    Ok(())
  }
}

/// Decode raw bytes into a [`DecodedImage`]
///
/// Dimensions are probed from the header first so limit violations are
/// rejected before any pixel buffer is allocated. The format is sniffed
/// from the bytes; the URL and Content-Type play no part here.
pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<DecodedImage, DecodeError> {
  let reader = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .map_err(|e| DecodeError::Malformed {
      reason: e.to_string(),
    })?;

  let (width, height) = reader
    .into_dimensions()
    .map_err(|e| DecodeError::Malformed {
      reason: e.to_string(),
    })?;
  config.check(width, height)?;

  let image = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .map_err(|e| DecodeError::Malformed {
      reason: e.to_string(),
    })?
    .decode()
    .map_err(|e| DecodeError::Malformed {
      reason: e.to_string(),
    })?;

  Ok(DecodedImage::new(image))
}
