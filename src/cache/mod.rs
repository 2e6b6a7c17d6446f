//! Multi-tier cache: memory LRU + optional durable store, per namespace.

mod durable;
mod manager;
pub(crate) mod memory;
mod namespace;

pub use durable::{DurableRecord, DurableStore, InMemoryDurableStore};
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub(crate) use memory::now_ms;
pub use namespace::{CacheNamespace, CacheStats};

/// Size-estimation contract used when `set()` is called without an
/// explicit size.
pub trait EstimateSize {
    /// Estimated heap footprint in bytes.
    fn estimate_size(&self) -> usize;
}

impl EstimateSize for bytes::Bytes {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for Vec<u8> {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for String {
    fn estimate_size(&self) -> usize {
        self.chars().count() * 2
    }
}
