//! Loader contracts the embedding application implements.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::PreloadError;
use crate::model::{CropRect, PageLocator};
use crate::preload::task::CancelHandle;

/// What a loader needs to fetch or decode one virtual page — a snapshot
/// taken from the virtual/physical page at request time, so loaders never
/// hold a reference into the Virtual Page List across `.await`.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTarget {
    /// Dense virtual index being loaded.
    pub virtual_index: usize,
    /// Where the backing bytes live.
    pub locator: PageLocator,
    /// Crop to apply, if this virtual page is one half of a split page.
    pub crop: Option<CropRect>,
}

/// Loads a page's full-resolution image bytes.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch and decode `target`, honoring `cancel`.
    async fn load(&self, target: &LoadTarget, cancel: CancelHandle) -> Result<Bytes, PreloadError>;
}

/// Loads a page's small preview render.
#[async_trait]
pub trait ThumbnailLoader: Send + Sync {
    /// Fetch and decode `target`, honoring `cancel`.
    async fn load(&self, target: &LoadTarget, cancel: CancelHandle) -> Result<Bytes, PreloadError>;
}

/// Derives a super-resolution render from an already-loaded image.
#[async_trait]
pub trait Upscaler: Send + Sync {
    /// Upscale `image_bytes` for `target`, honoring `cancel`.
    async fn upscale(
        &self,
        target: &LoadTarget,
        image_bytes: Bytes,
        cancel: CancelHandle,
    ) -> Result<Bytes, PreloadError>;
}
