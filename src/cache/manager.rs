//! Global namespace registry, periodic expiry sweep and warmup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::cache::namespace::CacheNamespace;
use crate::cache::EstimateSize;

/// Default period between automatic `cleanup_all_expired` sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Owns every cache namespace of a given value type `T` and the
/// background sweep task. There is no global/static instance — the core
/// never reaches for a singleton; whoever
/// assembles the book core (typically `BookCoordinator`) owns one manager
/// per artifact type and hands namespace handles around by reference.
pub struct CacheManager<T> {
    namespaces: RwLock<HashMap<String, Arc<CacheNamespace<T>>>>,
    sweep_task: RwLock<Option<JoinHandle<()>>>,
}

impl<T: Clone + EstimateSize + Send + Sync + 'static> CacheManager<T> {
    /// Construct an empty manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            namespaces: RwLock::new(HashMap::new()),
            sweep_task: RwLock::new(None),
        })
    }

    /// Register a namespace under its configured name.
    pub fn register(&self, namespace: Arc<CacheNamespace<T>>) {
        let name = namespace.config().name.clone();
        self.namespaces.write().insert(name, namespace);
    }

    /// Look up a previously registered namespace.
    pub fn namespace(&self, name: &str) -> Option<Arc<CacheNamespace<T>>> {
        self.namespaces.read().get(name).cloned()
    }

    /// Sweep every namespace's memory tier for expired entries.
    pub fn cleanup_all_expired(&self) -> usize {
        self.namespaces
            .read()
            .values()
            .map(|ns| ns.cleanup_expired())
            .sum()
    }

    /// Warm up every namespace from its durable store, concurrently.
    pub async fn warmup_all(&self) {
        let namespaces: Vec<_> = self.namespaces.read().values().cloned().collect();
        futures::future::join_all(namespaces.iter().map(|ns| ns.warmup(None))).await;
    }

    /// Start the periodic background sweep (default every 60s). Calling
    /// this twice replaces the previous task.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(manager) => {
                        manager.cleanup_all_expired();
                    }
                    None => break,
                }
            }
        });
        *self.sweep_task.write() = Some(handle);
    }

    /// Stop the background sweep task, if running.
    pub fn dispose(&self) {
        if let Some(handle) = self.sweep_task.write().take() {
            handle.abort();
        }
    }
}

impl<T> Drop for CacheManager<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::durable::InMemoryDurableStore;
    use crate::config::CacheNamespaceConfig;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let manager: Arc<CacheManager<Vec<u8>>> = CacheManager::new();
        let ns = Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("images"),
            None,
        ));
        manager.register(ns);
        assert!(manager.namespace("images").is_some());
        assert!(manager.namespace("thumbnails").is_none());
    }

    #[tokio::test]
    async fn test_cleanup_all_expired_aggregates_namespaces() {
        let manager: Arc<CacheManager<Vec<u8>>> = CacheManager::new();
        let ns_a = Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("a").with_ttl_ms(1),
            None,
        ));
        let ns_b = Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("b").with_ttl_ms(1),
            None,
        ));
        ns_a.set("k", vec![1], None).await;
        ns_b.set("k", vec![1], None).await;
        manager.register(ns_a);
        manager.register(ns_b);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.cleanup_all_expired(), 2);
    }

    #[tokio::test]
    async fn test_warmup_all_rehydrates_from_durable() {
        let manager: Arc<CacheManager<Vec<u8>>> = CacheManager::new();
        let store = InMemoryDurableStore::<Vec<u8>>::new();
        store.set("k", vec![7], 0, None).await.unwrap();
        let ns = Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("images").with_store("images"),
            Some(store),
        ));
        manager.register(ns.clone());
        manager.warmup_all().await;
        assert_eq!(ns.get_sync("k"), Some(vec![7]));
    }
}
