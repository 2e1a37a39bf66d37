use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;

static LIVE_INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// Budget configuration for an [`ImageCache`].
#[derive(Debug, Clone, Copy)]
pub struct ImageCacheOpts {
    /// Byte budget of the reclaimable tier. Locked entries may push the cache above it until the
    /// next `unlock_all`.
    pub max_bytes: usize,
}

impl Default for ImageCacheOpts {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

impl ImageCacheOpts {
    /// Defaults, with `CHARCOMP_IMAGE_CACHE_MAX_BYTES` overriding the budget when set.
    pub fn from_env() -> Self {
        let max_bytes = std::env::var("CHARCOMP_IMAGE_CACHE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(Self::default().max_bytes);
        Self { max_bytes }
    }
}

/// Point-in-time counters of an [`ImageCache`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageCacheStats {
    /// Number of `get` calls.
    pub reads: u64,
    /// Number of `get` calls that returned an image.
    pub hits: u64,
    /// Bytes held by live entries.
    pub live_bytes: usize,
    /// Number of live entries.
    pub live_entries: usize,
    /// Entries pinned since the last `unlock_all`.
    pub locked_entries: usize,
    /// Configured byte budget.
    pub max_bytes: usize,
    /// Entries dropped to honor the budget.
    pub evictions: u64,
    /// Number of `ImageCache` instances alive in the process.
    pub live_instances: usize,
}

struct Entry {
    image: Arc<RgbaImage>,
    bytes: usize,
    stamp: u64,
}

struct Inner<K> {
    // Reclaimable tier, ordered for eviction by `order` (oldest stamp first).
    entries: HashMap<K, Entry>,
    order: BTreeMap<u64, K>,
    // Locked tier: pinned until the next `unlock_all`/`clear`.
    locked: HashMap<K, Arc<RgbaImage>>,
    next_stamp: u64,
    live_bytes: usize,
    reads: u64,
    hits: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone> Inner<K> {
    fn bump(&mut self) -> u64 {
        self.next_stamp = self.next_stamp.wrapping_add(1);
        self.next_stamp
    }

    fn remove(&mut self, key: &K) -> bool {
        let Some(old) = self.entries.remove(key) else {
            return false;
        };
        self.order.remove(&old.stamp);
        self.live_bytes = self.live_bytes.saturating_sub(old.bytes);
        true
    }

    fn trim(&mut self, max_bytes: usize) {
        if self.live_bytes <= max_bytes {
            return;
        }
        let mut excess = self.live_bytes - max_bytes;
        let mut victims = Vec::new();
        for key in self.order.values() {
            if excess == 0 {
                break;
            }
            if self.locked.contains_key(key) {
                continue;
            }
            if let Some(e) = self.entries.get(key) {
                excess = excess.saturating_sub(e.bytes);
                victims.push(key.clone());
            }
        }
        for key in victims {
            if self.remove(&key) {
                self.evictions = self.evictions.saturating_add(1);
            }
        }
    }
}

/// Keyed store of decoded images with a locked tier and a byte-budgeted reclaimable tier.
///
/// Every `set` pins its entry in the locked tier, so it stays retrievable until the next
/// [`unlock_all`](Self::unlock_all) or [`clear`](Self::clear). After that the entry lives on in the
/// reclaimable tier and is evicted least-recently-used first once the byte budget is exceeded.
/// All operations lock an internal mutex for their duration.
pub struct ImageCache<K> {
    opts: ImageCacheOpts,
    inner: Mutex<Inner<K>>,
}

impl<K: Eq + Hash + Clone> ImageCache<K> {
    /// Create an empty cache.
    pub fn new(opts: ImageCacheOpts) -> Self {
        LIVE_INSTANCES.fetch_add(1, Ordering::Relaxed);
        Self {
            opts,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                locked: HashMap::new(),
                next_stamp: 0,
                live_bytes: 0,
                reads: 0,
                hits: 0,
                evictions: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K>> {
        // Every mutation leaves `Inner` consistent before it can panic, so a poisoned lock is
        // still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub fn get(&self, key: &K) -> Option<Arc<RgbaImage>> {
        let mut inner = self.lock();
        inner.reads = inner.reads.saturating_add(1);

        let stamp = inner.bump();
        let entry = inner.entries.get_mut(key)?;
        let old_stamp = std::mem::replace(&mut entry.stamp, stamp);
        let image = entry.image.clone();

        inner.order.remove(&old_stamp);
        inner.order.insert(stamp, key.clone());
        inner.hits = inner.hits.saturating_add(1);
        Some(image)
    }

    /// Store `image` under `key`, replacing any previous entry, and pin it in the locked tier.
    pub fn set(&self, key: K, image: Arc<RgbaImage>) {
        let bytes = image.as_raw().len();
        let mut inner = self.lock();
        inner.remove(&key);

        let stamp = inner.bump();
        inner.order.insert(stamp, key.clone());
        inner.locked.insert(key.clone(), image.clone());
        inner.entries.insert(
            key,
            Entry {
                image,
                bytes,
                stamp,
            },
        );
        inner.live_bytes = inner.live_bytes.saturating_add(bytes);
        inner.trim(self.opts.max_bytes);
    }

    /// Release every pin, making the previous generation reclaimable.
    pub fn unlock_all(&self) {
        let mut inner = self.lock();
        let released = inner.locked.len();
        inner.locked.clear();
        inner.trim(self.opts.max_bytes);
        tracing::trace!(
            released,
            live_bytes = inner.live_bytes,
            "image cache generation unlocked"
        );
    }

    /// Drop every entry from both tiers.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.locked.clear();
        inner.entries.clear();
        inner.order.clear();
        inner.live_bytes = 0;
    }

    /// `true` while `key` is pinned in the locked tier.
    pub fn is_locked(&self, key: &K) -> bool {
        self.lock().locked.contains_key(key)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> ImageCacheStats {
        let inner = self.lock();
        ImageCacheStats {
            reads: inner.reads,
            hits: inner.hits,
            live_bytes: inner.live_bytes,
            live_entries: inner.entries.len(),
            locked_entries: inner.locked.len(),
            max_bytes: self.opts.max_bytes,
            evictions: inner.evictions,
            live_instances: LIVE_INSTANCES.load(Ordering::Relaxed),
        }
    }
}

impl<K> Drop for ImageCache<K> {
    fn drop(&mut self) {
        LIVE_INSTANCES.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/image_cache.rs"]
mod tests;
