use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock abstraction so expiry logic can be tested without sleeping.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Real system clock. Use this in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Cloned clocks share the same elapsed time, so a clone handed to a cache
/// can be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by `duration` without waiting.
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // Test utility: panic on poisoned mutex to fail tests early
        self.start + *self.elapsed.lock().expect("mutex poisoned")
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache with a per-entry time-to-live.
///
/// `get` removes and ignores entries whose TTL has elapsed; nothing is ever
/// returned past its expiry. Growth is bounded by a soft entry cap: when an
/// insert finds the cache full it first sweeps expired entries, then, if
/// still full, evicts the entry closest to expiry.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache driven by the system clock.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Creates a cache driven by the given clock.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            clock,
        }
    }

    /// Returns the cached value for `key` if present and unexpired.
    ///
    /// An expired entry is removed on this access.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.capacity {
                let evict = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(k) = evict {
                    tracing::debug!("TTL cache full, evicting entry nearest expiry: {}", k);
                    entries.remove(&k);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Number of entries currently stored, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialized response body with a SHA-256 integrity checksum.
///
/// The checksum is computed when the body enters the cache and re-verified on
/// every hit; a mismatch means the entry was corrupted or tampered with and
/// the caller must treat the lookup as a miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBody {
    body: String,
    checksum: String,
}

impl CachedBody {
    pub fn new(body: String) -> Self {
        let checksum = Self::compute_checksum(&body);
        Self { body, checksum }
    }

    fn compute_checksum(body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns the body if the checksum still matches, `None` otherwise.
    pub fn verify(&self) -> Option<&str> {
        if Self::compute_checksum(&self.body) == self.checksum {
            Some(&self.body)
        } else {
            tracing::warn!(
                "Cached body failed checksum verification (expected {}, {} bytes)",
                self.checksum,
                self.body.len()
            );
            None
        }
    }
}
