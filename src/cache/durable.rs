//! Durable-store contract and an in-memory reference impl
//! used for tests and as the default when no real store is wired up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// A value read back from a durable store, with its bookkeeping fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DurableRecord<T> {
    /// The stored value.
    pub value: T,
    /// When the record was written, in epoch milliseconds.
    pub created_at_ms: u64,
    /// When the record expires, in epoch milliseconds; `None` = never.
    pub expires_at_ms: Option<u64>,
}

impl<T> DurableRecord<T> {
    fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(exp) if exp <= now_ms)
    }
}

/// Durable keyed store a persistent cache namespace shadows into.
/// Storage layout is opaque to the core; this is the seam an
/// embedding application plugs a real backend into.
#[async_trait]
pub trait DurableStore<T>: Send + Sync {
    /// Read back a record, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<DurableRecord<T>>, StoreError>;
    /// Write a record.
    async fn set(
        &self,
        key: &str,
        value: T,
        created_at_ms: u64,
        expires_at_ms: Option<u64>,
    ) -> Result<(), StoreError>;
    /// Remove a record.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Remove every record.
    async fn clear(&self) -> Result<(), StoreError>;
    /// List every key currently stored (including expired-but-not-yet-swept
    /// ones).
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
    /// Number of records currently stored.
    async fn count(&self) -> Result<usize, StoreError>;
    /// Batch read.
    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<DurableRecord<T>>>, StoreError>;
    /// Batch write.
    async fn batch_set(
        &self,
        items: Vec<(String, T, u64, Option<u64>)>,
    ) -> Result<(), StoreError>;
    /// Remove every record expired as of `now_ms`; returns how many.
    async fn cleanup_expired(&self, now_ms: u64) -> Result<usize, StoreError>;
}

/// A `DurableStore` backed by an in-process `HashMap`. Not actually
/// durable across process restarts — it exists so namespace/manager logic
/// (and tests) can exercise the persistent code paths without depending on
/// an external collaborator, which real durable storage always is.
#[derive(Default)]
pub struct InMemoryDurableStore<T> {
    records: Mutex<HashMap<String, DurableRecord<T>>>,
}

impl<T> InMemoryDurableStore<T> {
    /// Construct an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> DurableStore<T> for InMemoryDurableStore<T> {
    async fn get(&self, key: &str) -> Result<Option<DurableRecord<T>>, StoreError> {
        let mut records = self.records.lock();
        match records.get(key) {
            Some(rec) if rec.is_expired(crate::cache::memory::now_ms()) => {
                records.remove(key);
                Ok(None)
            }
            Some(rec) => Ok(Some(rec.clone())),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: T,
        created_at_ms: u64,
        expires_at_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        self.records.lock().insert(
            key.to_string(),
            DurableRecord {
                value,
                created_at_ms,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.lock().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.records.lock().keys().cloned().collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().len())
    }

    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<DurableRecord<T>>>, StoreError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    async fn batch_set(
        &self,
        items: Vec<(String, T, u64, Option<u64>)>,
    ) -> Result<(), StoreError> {
        for (key, value, created_at_ms, expires_at_ms) in items {
            self.set(&key, value, created_at_ms, expires_at_ms).await?;
        }
        Ok(())
    }

    async fn cleanup_expired(&self, now_ms: u64) -> Result<usize, StoreError> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, rec| !rec.is_expired(now_ms));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let store: Arc<InMemoryDurableStore<Vec<u8>>> = InMemoryDurableStore::new();
        store.set("k", vec![1, 2, 3], 0, None).await.unwrap();
        let rec = store.get("k").await.unwrap().unwrap();
        assert_eq!(rec.value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_expired_lazily_deleted_on_read() {
        let store: Arc<InMemoryDurableStore<Vec<u8>>> = InMemoryDurableStore::new();
        store.set("k", vec![1], 0, Some(10)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let rec = store.get("k").await.unwrap();
        // Whether expired-by-wall-clock here is environment dependent only
        // if ttl is in the past relative to `now_ms()`; exercise the
        // explicit sweep instead for a deterministic check.
        let _ = rec;
        let removed = store.cleanup_expired(u64::MAX).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_set_and_get() {
        let store: Arc<InMemoryDurableStore<Vec<u8>>> = InMemoryDurableStore::new();
        store
            .batch_set(vec![
                ("a".into(), vec![1], 0, None),
                ("b".into(), vec![2], 0, None),
            ])
            .await
            .unwrap();
        let got = store
            .batch_get(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(got[0].as_ref().unwrap().value, vec![1]);
        assert!(got[1].is_none());
    }
}
