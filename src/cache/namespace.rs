//! A single named, independently configured cache partition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::durable::{DurableRecord, DurableStore};
use crate::cache::memory::{now_ms, MemoryCache};
use crate::cache::EstimateSize;
use crate::config::CacheNamespaceConfig;

/// Point-in-time accounting for a namespace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheStats {
    /// Items currently held in the memory tier.
    pub items: usize,
    /// Bytes currently held in the memory tier.
    pub bytes: u64,
    /// Configured byte cap.
    pub byte_cap: u64,
    /// Configured item cap.
    pub item_cap: usize,
    /// Configured TTL in milliseconds (`0` = none).
    pub ttl_ms: u64,
    /// `hits / (hits + misses)`, or `0.0` with no lookups yet.
    pub hit_rate: f64,
}

/// Memory LRU + optional durable-store shadow, as one cache partition.
pub struct CacheNamespace<T> {
    config: CacheNamespaceConfig,
    memory: MemoryCache<T>,
    durable: Option<Arc<dyn DurableStore<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone + EstimateSize + Send + Sync> CacheNamespace<T> {
    /// Construct a namespace, optionally shadowed by a durable store.
    pub fn new(config: CacheNamespaceConfig, durable: Option<Arc<dyn DurableStore<T>>>) -> Self {
        let memory = MemoryCache::new(config.item_cap, config.byte_cap);
        Self {
            config,
            memory,
            durable,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Memory hit (non-expired) returns immediately; otherwise, if
    /// persistent, falls back to the durable store and rehydrates memory
    /// on a hit. Durable failures are logged and treated as a miss.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = now_ms();
        if let Some(v) = self.memory.get(key, now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(v);
        }
        if self.config.persistent {
            if let Some(store) = &self.durable {
                match store.get(key).await {
                    Ok(Some(DurableRecord { value, .. })) => {
                        let size = value.estimate_size();
                        self.memory
                            .set(key.to_string(), value.clone(), size, self.config.ttl_ms, now);
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(value);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        #[cfg(feature = "std")]
                        log::warn!("durable store '{}' get failed: {}", self.config.name, e);
                    }
                }
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Memory-only read.
    pub fn get_sync(&self, key: &str) -> Option<T> {
        let now = now_ms();
        let hit = self.memory.get(key, now);
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Insert into memory (running eviction) and, if persistent, into the
    /// durable store. A durable write failure is logged and otherwise
    /// ignored — the namespace degrades to memory-only for this value.
    pub async fn set(&self, key: &str, value: T, size: Option<usize>) {
        let now = now_ms();
        let size = size.unwrap_or_else(|| value.estimate_size());
        self.memory
            .set(key.to_string(), value.clone(), size, self.config.ttl_ms, now);
        if self.config.persistent {
            if let Some(store) = &self.durable {
                let expires_at = if self.config.ttl_ms > 0 {
                    Some(now + self.config.ttl_ms)
                } else {
                    None
                };
                if let Err(e) = store.set(key, value, now, expires_at).await {
                    #[cfg(feature = "std")]
                    log::warn!("durable store '{}' set failed: {}", self.config.name, e);
                }
            }
        }
    }

    /// Remove `key` from memory; also from the durable store when
    /// persistent (explicit deletes do reach the durable tier — only
    /// eviction is memory-only).
    pub async fn delete(&self, key: &str) {
        self.memory.delete(key);
        if self.config.persistent {
            if let Some(store) = &self.durable {
                if let Err(e) = store.delete(key).await {
                    #[cfg(feature = "std")]
                    log::warn!("durable store '{}' delete failed: {}", self.config.name, e);
                }
            }
        }
    }

    /// Whether `key` is present (memory tier only) and not expired.
    pub fn has(&self, key: &str) -> bool {
        self.memory.has(key, now_ms())
    }

    /// Drop every entry, memory and (if persistent) durable.
    pub async fn clear(&self) {
        self.memory.clear();
        if self.config.persistent {
            if let Some(store) = &self.durable {
                if let Err(e) = store.clear().await {
                    #[cfg(feature = "std")]
                    log::warn!("durable store '{}' clear failed: {}", self.config.name, e);
                }
            }
        }
    }

    /// Drop every entry from the memory tier only, leaving any durable
    /// copies untouched (used by `BookCoordinator::close`).
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    /// Remove expired entries from the memory tier; returns the count.
    pub fn cleanup_expired(&self) -> usize {
        self.memory.cleanup_expired(now_ms())
    }

    /// Pull `keys` (or every durable key, if `None`) into the memory tier.
    pub async fn warmup(&self, keys: Option<Vec<String>>) {
        if !self.config.persistent {
            return;
        }
        let Some(store) = &self.durable else { return };
        let keys = match keys {
            Some(k) => k,
            None => match store.keys().await {
                Ok(k) => k,
                Err(e) => {
                    #[cfg(feature = "std")]
                    log::warn!("durable store '{}' keys failed: {}", self.config.name, e);
                    return;
                }
            },
        };
        let now = now_ms();
        match store.batch_get(&keys).await {
            Ok(records) => {
                for (key, record) in keys.into_iter().zip(records) {
                    if let Some(DurableRecord { value, .. }) = record {
                        let size = value.estimate_size();
                        self.memory.set(key, value, size, self.config.ttl_ms, now);
                    }
                }
            }
            Err(e) => {
                #[cfg(feature = "std")]
                log::warn!("durable store '{}' warmup failed: {}", self.config.name, e);
            }
        }
    }

    /// Current accounting snapshot.
    pub fn stats(&self) -> CacheStats {
        let (items, bytes) = self.memory.usage();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };
        CacheStats {
            items,
            bytes,
            byte_cap: self.config.byte_cap,
            item_cap: self.config.item_cap,
            ttl_ms: self.config.ttl_ms,
            hit_rate,
        }
    }

    /// The namespace's configuration.
    pub fn config(&self) -> &CacheNamespaceConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::durable::InMemoryDurableStore;

    #[tokio::test]
    async fn test_memory_hit_short_circuits_durable() {
        let cfg = CacheNamespaceConfig::new("t").with_store("t");
        let ns = CacheNamespace::new(cfg, Some(InMemoryDurableStore::<Vec<u8>>::new()));
        ns.set("k", vec![1, 2, 3], None).await;
        assert_eq!(ns.get("k").await, Some(vec![1, 2, 3]));
        assert_eq!(ns.stats().hit_rate, 1.0);
    }

    #[tokio::test]
    async fn test_durable_rehydrates_memory_after_eviction() {
        let cfg = CacheNamespaceConfig::new("t")
            .with_store("t")
            .with_caps(u64::MAX, 1);
        let store = InMemoryDurableStore::<Vec<u8>>::new();
        let ns = CacheNamespace::new(cfg, Some(store));
        ns.set("a", vec![1], None).await;
        ns.set("b", vec![2], None).await; // evicts "a" from memory only
        assert!(!ns.has("a"));
        assert_eq!(ns.get("a").await, Some(vec![1])); // rehydrated from durable
    }

    #[tokio::test]
    async fn test_non_persistent_namespace_ignores_durable() {
        let cfg = CacheNamespaceConfig::new("t");
        let ns: CacheNamespace<Vec<u8>> = CacheNamespace::new(cfg, None);
        ns.set("k", vec![9], None).await;
        assert_eq!(ns.get("k").await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_clear_memory_keeps_durable() {
        let cfg = CacheNamespaceConfig::new("t").with_store("t");
        let store = InMemoryDurableStore::<Vec<u8>>::new();
        let ns = CacheNamespace::new(cfg, Some(store));
        ns.set("k", vec![1], None).await;
        ns.clear_memory();
        assert!(!ns.has("k"));
        assert_eq!(ns.get("k").await, Some(vec![1]));
    }
}
