pub mod cache;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod retry;

pub use cache::{CacheConfig, CacheStats, ImageCache};
pub use decode::{decode, DecodeConfig, DecodedImage};
pub use error::{DecodeError, Error, FetchError, Result};
pub use fetch::{FetchClient, FetchResponse, HttpFetcher};
pub use loader::{ImageLoader, LoadState, LoaderConfig};
pub use retry::RetryPolicy;
