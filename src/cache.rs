//! Bounded in-memory image cache
//!
//! `ImageCache` is a process-wide, thread-safe store of decoded images keyed
//! by URL. It enforces two limits after every mutation: a total resident
//! cost (bytes) and an entry count. Victim selection is least-recently-used,
//! but callers must only rely on the limits, not on which entry goes.
//!
//! The cache is shared by every loader in the process; construct one
//! `Arc<ImageCache>` at startup and hand it to each
//! [`ImageLoader`](crate::loader::ImageLoader).

use crate::decode::DecodedImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Configuration for [`ImageCache`]
///
/// `0` disables a limit.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
  /// Maximum total resident cost in bytes. `0` disables the limit.
  pub total_cost_limit: usize,
  /// Maximum number of entries. `0` disables the limit.
  pub count_limit: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      total_cost_limit: 50 * 1024 * 1024,
      count_limit: 300,
    }
  }
}

impl CacheConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_total_cost_limit(mut self, limit: usize) -> Self {
    self.total_cost_limit = limit;
    self
  }

  pub fn with_count_limit(mut self, limit: usize) -> Self {
    self.count_limit = limit;
    self
  }
}

/// Snapshot of cache activity counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub requests: u64,
  pub hits: u64,
  pub misses: u64,
}

struct CacheSlot {
  image: DecodedImage,
  cost: usize,
  last_used: u64,
}

struct CacheInner {
  entries: HashMap<Url, CacheSlot>,
  total_cost: usize,
  tick: u64,
}

/// Bounded, cost-aware, thread-safe URL → decoded-image store
///
/// # Example
///
/// ```
/// use imgloader::cache::{CacheConfig, ImageCache};
///
/// let cache = ImageCache::with_config(
///     CacheConfig::new().with_total_cost_limit(8 * 1024 * 1024),
/// );
/// assert_eq!(cache.len(), 0);
/// ```
pub struct ImageCache {
  inner: Mutex<CacheInner>,
  config: CacheConfig,
  requests: AtomicU64,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl ImageCache {
  /// Create a cache with the default limits (50 MiB, 300 entries).
  pub fn new() -> Self {
    Self::with_config(CacheConfig::default())
  }

  /// Create a cache with custom limits.
  pub fn with_config(config: CacheConfig) -> Self {
    Self {
      inner: Mutex::new(CacheInner {
        entries: HashMap::new(),
        total_cost: 0,
        tick: 0,
      }),
      config,
      requests: AtomicU64::new(0),
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  pub fn config(&self) -> CacheConfig {
    self.config
  }

  /// Look up a decoded image, refreshing its recency on a hit.
  pub fn get(&self, key: &Url) -> Option<DecodedImage> {
    self.requests.fetch_add(1, Ordering::Relaxed);
    let mut inner = self.lock();
    inner.tick += 1;
    let tick = inner.tick;
    match inner.entries.get_mut(key) {
      Some(slot) => {
        slot.last_used = tick;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(slot.image.clone())
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Insert or replace an entry, then evict until both limits hold.
  ///
  /// The just-inserted entry is never chosen as a victim: if it alone
  /// exceeds the cost limit it is still stored and only older entries are
  /// evicted.
  pub fn put(&self, key: Url, image: DecodedImage, cost: usize) {
    let mut inner = self.lock();
    inner.tick += 1;
    let tick = inner.tick;

    if let Some(old) = inner.entries.remove(&key) {
      inner.total_cost -= old.cost;
    }
    inner.total_cost += cost;
    inner.entries.insert(
      key.clone(),
      CacheSlot {
        image,
        cost,
        last_used: tick,
      },
    );

    self.evict(&mut inner, &key);
  }

  fn evict(&self, inner: &mut CacheInner, keep: &Url) {
    loop {
      let over_cost =
        self.config.total_cost_limit > 0 && inner.total_cost > self.config.total_cost_limit;
      let over_count = self.config.count_limit > 0 && inner.entries.len() > self.config.count_limit;
      if !over_cost && !over_count {
        return;
      }

      let victim = inner
        .entries
        .iter()
        .filter(|(key, _)| *key != keep)
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(key, _)| key.clone());
      let Some(victim) = victim else {
        // Only the just-inserted entry remains; it always stays.
        return;
      };
      if let Some(slot) = inner.entries.remove(&victim) {
        inner.total_cost -= slot.cost;
      }
    }
  }

  pub fn contains(&self, key: &Url) -> bool {
    self.lock().entries.contains_key(key)
  }

  /// Number of resident entries.
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Total resident cost in bytes.
  pub fn total_cost(&self) -> usize {
    self.lock().total_cost
  }

  /// Drop every entry. Counters are left untouched.
  pub fn clear(&self) {
    let mut inner = self.lock();
    inner.entries.clear();
    inner.total_cost = 0;
  }

  /// Snapshot of the request/hit/miss counters.
  pub fn stats(&self) -> CacheStats {
    CacheStats {
      requests: self.requests.load(Ordering::Relaxed),
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
    }
  }

  fn lock(&self) -> MutexGuard<'_, CacheInner> {
    self
      .inner
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Default for ImageCache {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::DynamicImage;

  fn test_url(name: &str) -> Url {
    Url::parse(&format!("https://cdn.example.com/{name}")).expect("parse url")
  }

  fn test_image(width: u32, height: u32) -> DecodedImage {
    DecodedImage::new(DynamicImage::new_rgba8(width, height))
  }

  #[test]
  fn get_returns_inserted_image() {
    let cache = ImageCache::new();
    let url = test_url("a.png");
    let image = test_image(2, 2);
    cache.put(url.clone(), image.clone(), image.cost());

    let hit = cache.get(&url).expect("hit");
    assert!(hit.ptr_eq(&image));
    assert!(cache.get(&test_url("other.png")).is_none());
  }

  #[test]
  fn replace_updates_cost() {
    let cache = ImageCache::new();
    let url = test_url("a.png");
    cache.put(url.clone(), test_image(1, 1), 100);
    cache.put(url.clone(), test_image(2, 2), 300);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.total_cost(), 300);
  }

  #[test]
  fn count_limit_holds_after_every_put() {
    let cache = ImageCache::with_config(CacheConfig::new().with_count_limit(3));
    for i in 0..10 {
      cache.put(test_url(&format!("{i}.png")), test_image(1, 1), 4);
      assert!(cache.len() <= 3, "count limit violated at put {i}");
    }
  }

  #[test]
  fn cost_limit_holds_after_every_put() {
    let cache = ImageCache::with_config(CacheConfig::new().with_total_cost_limit(1000));
    for i in 0..10 {
      cache.put(test_url(&format!("{i}.png")), test_image(1, 1), 400);
      assert!(
        cache.total_cost() <= 1000,
        "cost limit violated at put {i}: {}",
        cache.total_cost()
      );
    }
  }

  #[test]
  fn oversized_entry_is_stored_and_evicts_only_others() {
    let cache = ImageCache::with_config(CacheConfig::new().with_total_cost_limit(1000));
    let small = test_url("small.png");
    cache.put(small.clone(), test_image(1, 1), 100);

    let huge = test_url("huge.png");
    cache.put(huge.clone(), test_image(1, 1), 5000);

    assert!(cache.contains(&huge), "oversized entry must still be stored");
    assert!(!cache.contains(&small), "older entries are evicted first");
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn eviction_prefers_least_recently_used() {
    let cache = ImageCache::with_config(CacheConfig::new().with_count_limit(2));
    let a = test_url("a.png");
    let b = test_url("b.png");
    cache.put(a.clone(), test_image(1, 1), 4);
    cache.put(b.clone(), test_image(1, 1), 4);

    // Touch `a` so `b` becomes the LRU victim.
    let _ = cache.get(&a);
    cache.put(test_url("c.png"), test_image(1, 1), 4);

    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
  }

  #[test]
  fn zero_disables_limits() {
    let cache = ImageCache::with_config(
      CacheConfig::new()
        .with_total_cost_limit(0)
        .with_count_limit(0),
    );
    for i in 0..500 {
      cache.put(test_url(&format!("{i}.png")), test_image(1, 1), 1_000_000);
    }
    assert_eq!(cache.len(), 500);
  }

  #[test]
  fn clear_empties_the_cache() {
    let cache = ImageCache::new();
    cache.put(test_url("a.png"), test_image(1, 1), 4);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.total_cost(), 0);
  }

  #[test]
  fn stats_track_hits_and_misses() {
    let cache = ImageCache::new();
    let url = test_url("a.png");
    assert!(cache.get(&url).is_none());
    cache.put(url.clone(), test_image(1, 1), 4);
    assert!(cache.get(&url).is_some());
    assert!(cache.get(&url).is_some());

    let stats = cache.stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
  }
}
