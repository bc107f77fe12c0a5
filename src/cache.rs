//! In-process TTL cache.
//!
//! One explicit instance is constructed at startup and injected into
//! every handler; there is no ambient singleton. Values are stored as
//! JSON so a single cache serves heterogeneous response types. Expired
//! entries read as misses but stay in the map until the background
//! sweep ([`TtlCache::spawn_cleanup`]) reclaims them, so a route whose
//! live data layers all fail can still serve the expired copy via
//! [`TtlCache::get_stale`].
//!
//! There is deliberately no size bound: key cardinality is small
//! (composite request keys) and entry lifetime is bounded by the sweep.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default interval for the background cleanup sweep.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key→value store with per-entry expiry.
///
/// A read past expiry behaves identically to absence. Concurrent
/// writers to the same key race last-write-wins, which is acceptable:
/// both writes hold equally fresh data.
pub struct TtlCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        TtlCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store a value under `key` for `ttl`. Overwrites any previous
    /// entry and resets its expiry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for cache, skipping");
                return;
            }
        };
        let entry = Entry {
            value: json,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Fetch a value by key. Returns `None` on absence, expiry, or a
    /// type mismatch against what was stored — never an error.
    ///
    /// Reads never mutate the map; an expired entry is left in place
    /// for [`get_stale`](Self::get_stale) until the sweep removes it.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => None,
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => match serde_json::from_value(entry.value.clone()) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Cached value failed to deserialize");
                    None
                }
            },
        }
    }

    /// Fetch a value by key regardless of expiry. Last-resort read for
    /// routes whose live data layers have all failed; an entry stays
    /// servable for at most one sweep interval past its TTL.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cached value failed to deserialize");
                None
            }
        }
    }

    /// Remove a key. Returns whether an entry (expired or not) existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Remove all expired entries. Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Spawn the periodic cleanup sweep. The handle may be dropped to
    /// let the task run detached for the process lifetime.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; nothing to sweep yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup().await;
                if removed > 0 {
                    let remaining = cache.len().await;
                    debug!(removed, remaining, "Cache sweep");
                }
            }
        })
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        TtlCache::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
