//! bookcore -- focus-tracked page list, frame layout and preload scheduler
//! for a local comic/image book reader.
//!
//! Five pieces compose into a book-reading session:
//!
//! - [`virtual_list`] turns an ordered set of physical pages into a
//!   sortable, filterable, splittable sequence of virtual pages.
//! - [`frame`] lays virtual pages out into the one- or two-element units
//!   actually rendered, with an LRU frame cache.
//! - [`preload`] keeps a window of images/thumbnails/upscales warm around
//!   the current focus, deduplicating and prioritizing loads.
//! - [`cache`] is the multi-tier (memory + optional durable) cache every
//!   artifact namespace is built on.
//! - [`coordinator`] glues the above into one `BookCoordinator` session.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod frame;
pub mod model;
pub mod preload;
pub mod virtual_list;

pub use cache::{CacheManager, CacheNamespace, CacheStats, DurableRecord, DurableStore, EstimateSize};
pub use config::{
    BookOpenOptions, CacheNamespaceConfig, FrameConfig, PageMode, PreloadConfig, ReadingOrder,
    VirtualListConfig, VirtualListConfigPatch,
};
pub use coordinator::BookCoordinator;
pub use error::{ArtifactKind, PreloadError, StoreError};
pub use events::{CoreEvent, EventBus};
pub use frame::{FrameElement, PageFrame, PageFrameBuilder, Terminal};
pub use model::{
    BookInfo, CropRect, PageKind, PageLocator, PagePosition, PageRange, Part, PhysicalPage, VirtualPage,
};
pub use preload::{
    CancelHandle, Fingerprint, ImageLoader, LoadTarget, PreloadCaches, PreloadPipeline, PreloadTask,
    TaskStatus, ThumbnailLoader, Upscaler,
};
pub use virtual_list::{RebuildOutcome, SortMode, VirtualPageList};
