//! In-memory cache of processed PDFs, so one tool call can feed the next

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A cached document and the name it should be offered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPdf {
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

struct CacheInner {
    lru: LruCache<String, CachedPdf>,
    total_bytes: usize,
}

/// LRU cache bounded by entry count and total bytes
pub struct PdfCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl PdfCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a document under `key`.
    /// Entries larger than the whole budget are dropped; otherwise
    /// least-recently-used entries are evicted until the new one fits.
    /// Returns whether the entry was stored.
    pub fn put(&self, key: String, entry: CachedPdf) -> bool {
        let new_size = entry.data.len();
        if new_size > self.max_bytes {
            tracing::debug!(size = new_size, max = self.max_bytes, "Cache entry too large");
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.data.len());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
                }
                None => break,
            }
        }

        // Count-based eviction happens inside `push`; keep the byte total in step
        if let Some((evicted_key, evicted)) = inner.lru.push(key.clone(), entry) {
            if evicted_key != key {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
            }
        }
        inner.total_bytes += new_size;
        true
    }

    /// Store a document under a fresh key and return the key,
    /// or `None` if the document does not fit in the cache at all
    pub fn insert(&self, entry: CachedPdf) -> Option<String> {
        let key = self.generate_unique_key();
        self.put(key.clone(), entry).then_some(key)
    }

    pub fn get(&self, key: &str) -> Option<CachedPdf> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
