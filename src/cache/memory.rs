//! In-process LRU tier with byte/item caps and TTL.

use std::collections::hash_map::RandomState;
use std::num::NonZeroUsize;
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use parking_lot::Mutex;

/// One memory-tier record.
#[derive(Clone, Debug)]
struct CacheEntry<T> {
    value: T,
    size: usize,
    #[allow(dead_code)]
    created_at_ms: u64,
    last_accessed_ms: u64,
    access_count: u64,
    expires_at_ms: Option<u64>,
}

/// Milliseconds since the epoch; callers take one reading and thread it
/// through an operation rather than re-reading the clock, so a batch of
/// checks sees a consistent "now".
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Bounded, TTL-aware memory cache. `lru::LruCache` enforces the item cap
/// directly; the byte cap is enforced by evicting the LRU entry until
/// total bytes fit, independent of the item-count eviction.
pub struct MemoryCache<T> {
    inner: Mutex<Inner<T>>,
    byte_cap: u64,
}

struct Inner<T> {
    entries: LruCache<String, CacheEntry<T>, RandomState>,
    total_bytes: u64,
}

impl<T: Clone> MemoryCache<T> {
    /// Create a cache with the given item and byte caps.
    pub fn new(item_cap: usize, byte_cap: u64) -> Self {
        let cap = NonZeroUsize::new(item_cap.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::with_hasher(cap, RandomState::new()),
                total_bytes: 0,
            }),
            byte_cap,
        }
    }

    /// Memory-only read; touches recency on hit, treats expired entries as
    /// absent without removing them (the caller decides whether to sweep).
    pub fn get(&self, key: &str, now_ms: u64) -> Option<T> {
        let mut inner = self.inner.lock();
        let hit = {
            let entry = inner.entries.get_mut(key)?;
            if let Some(exp) = entry.expires_at_ms {
                if exp <= now_ms {
                    return None;
                }
            }
            entry.last_accessed_ms = now_ms;
            entry.access_count += 1;
            entry.value.clone()
        };
        Some(hit)
    }

    /// Insert or overwrite `key`, running eviction afterward.
    pub fn set(&self, key: String, value: T, size: usize, ttl_ms: u64, now_ms: u64) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.peek(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.size as u64);
        }
        let expires_at_ms = if ttl_ms > 0 {
            Some(now_ms + ttl_ms)
        } else {
            None
        };
        let entry = CacheEntry {
            value,
            size,
            created_at_ms: now_ms,
            last_accessed_ms: now_ms,
            access_count: 0,
            expires_at_ms,
        };
        if let Some(evicted) = inner.entries.push(key, entry).map(|(_, e)| e) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size as u64);
        }
        inner.total_bytes += size as u64;
        self.evict_over_byte_cap(&mut inner);
    }

    fn evict_over_byte_cap(&self, inner: &mut Inner<T>) {
        while inner.total_bytes > self.byte_cap {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size as u64);
                }
                None => break,
            }
        }
    }

    /// Remove `key`, if present.
    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.pop(key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(entry.size as u64);
        }
    }

    /// Whether `key` is present and not expired.
    pub fn has(&self, key: &str, now_ms: u64) -> bool {
        self.get(key, now_ms).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    /// Remove all expired entries; returns how many were removed.
    pub fn cleanup_expired(&self, now_ms: u64) -> usize {
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter_map(|(k, e)| match e.expires_at_ms {
                Some(exp) if exp <= now_ms => Some(k.clone()),
                _ => None,
            })
            .collect();
        for key in &expired {
            if let Some(entry) = inner.entries.pop(key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(entry.size as u64);
            }
        }
        expired.len()
    }

    /// `(items, bytes)`.
    pub fn usage(&self) -> (usize, u64) {
        let inner = self.inner.lock();
        (inner.entries.len(), inner.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_cap_eviction() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(2, u64::MAX);
        cache.set("a".into(), vec![1], 1, 0, 0);
        cache.set("b".into(), vec![2], 1, 0, 1);
        cache.set("c".into(), vec![3], 1, 0, 2);
        assert_eq!(cache.usage().0, 2);
        assert!(cache.get("a", 3).is_none());
        assert!(cache.get("b", 3).is_some());
        assert!(cache.get("c", 3).is_some());
    }

    #[test]
    fn test_byte_cap_eviction_scenario_5() {
        // byte_cap=1000, 150-byte items: the 7th insert crosses 1000,
        // forcing exactly one LRU eviction so the total stays <= 1000.
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(1000, 1000);
        for i in 0..10 {
            cache.set(format!("k{i}"), vec![0u8; 150], 150, 0, i as u64);
        }
        let (items, bytes) = cache.usage();
        assert!(bytes <= 1000);
        assert!(items < 10);
    }

    #[test]
    fn test_ttl_expiry_scenario_6() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(10, u64::MAX);
        cache.set("k".into(), vec![1, 2, 3], 3, 100, 0);
        assert!(cache.get("k", 50).is_some());
        assert!(cache.get("k", 150).is_none());
        assert_eq!(cache.cleanup_expired(150), 1);
        assert_eq!(cache.usage().0, 0);
    }

    #[test]
    fn test_overwrite_updates_byte_total() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(10, u64::MAX);
        cache.set("k".into(), vec![0; 10], 10, 0, 0);
        cache.set("k".into(), vec![0; 30], 30, 0, 1);
        assert_eq!(cache.usage(), (1, 30));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(10, u64::MAX);
        cache.set("k".into(), vec![0; 10], 10, 0, 0);
        cache.delete("k");
        assert_eq!(cache.usage(), (0, 0));

        cache.set("a".into(), vec![0; 5], 5, 0, 0);
        cache.set("b".into(), vec![0; 5], 5, 0, 0);
        cache.clear();
        assert_eq!(cache.usage(), (0, 0));
    }
}
