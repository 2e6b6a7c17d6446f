//! Glues the virtual page list, frame builder and preload pipeline into one
//! stateful session over an open book.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::cache::CacheNamespace;
use crate::config::{
    BookOpenOptions, CacheNamespaceConfig, FrameConfig, PreloadConfig, VirtualListConfigPatch,
};
use crate::error::{ArtifactKind, PreloadError};
use crate::events::{CoreEvent, EventBus};
use crate::frame::PageFrame;
use crate::model::{BookInfo, PagePosition, PhysicalPage};
use crate::preload::{ImageLoader, PreloadCaches, PreloadPipeline, ThumbnailLoader, Upscaler};
use crate::virtual_list::{RebuildOutcome, SortMode, VirtualPageList};
use crate::PageFrameBuilder;

/// A single open book: its virtual page list, frame layout cache and
/// preload pipeline, wired together so that navigation and settings
/// changes keep all three consistent.
pub struct BookCoordinator {
    list: Arc<RwLock<VirtualPageList>>,
    frames: Mutex<PageFrameBuilder>,
    preload: Arc<PreloadPipeline>,
    events: EventBus,
    position: Mutex<PagePosition>,
    direction: Mutex<i8>,
}

impl BookCoordinator {
    /// Construct a coordinator with empty page lists and the given frame
    /// and preload configuration. Cache namespaces are created with the
    /// documented defaults; callers wanting durable shadowing or custom
    /// caps should build their own `PreloadCaches` and use
    /// `with_caches` instead.
    pub fn new(frame_config: FrameConfig, preload_config: PreloadConfig) -> Arc<Self> {
        let caches = PreloadCaches {
            images: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("image"), None)),
            thumbnails: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("thumbnail"), None)),
            upscales: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("upscale"), None)),
        };
        Self::with_caches(frame_config, preload_config, caches)
    }

    /// Construct a coordinator with explicitly assembled cache namespaces
    /// (e.g. durable-backed thumbnails for a "recently closed books" shelf).
    pub fn with_caches(
        frame_config: FrameConfig,
        preload_config: PreloadConfig,
        caches: PreloadCaches,
    ) -> Arc<Self> {
        let list = Arc::new(RwLock::new(VirtualPageList::new()));
        let preload = PreloadPipeline::new(list.clone(), preload_config, caches);
        Arc::new(Self {
            list,
            frames: Mutex::new(PageFrameBuilder::new(frame_config)),
            preload,
            events: EventBus::new(),
            position: Mutex::new(PagePosition::NULL),
            direction: Mutex::new(1),
        })
    }

    /// Register an observer for lifecycle events.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer);
    }

    /// Install the image loader used by the preload pipeline.
    pub fn set_image_loader(&self, loader: Arc<dyn ImageLoader>) {
        self.preload.set_image_loader(loader);
    }

    /// Install the thumbnail loader used by the preload pipeline.
    pub fn set_thumbnail_loader(&self, loader: Arc<dyn ThumbnailLoader>) {
        self.preload.set_thumbnail_loader(loader);
    }

    /// Install the upscaler used by the preload pipeline.
    pub fn set_upscaler(&self, upscaler: Arc<dyn Upscaler>) {
        self.preload.set_upscaler(upscaler);
    }

    /// Open a book: replace the physical page list and jump to
    /// `opts.start_index` (clamped into range). Emits `BookOpen` carrying
    /// the book's locator/metadata, then `PageChange`.
    pub fn open(self: &Arc<Self>, book_locator: impl Into<String>, pages: Vec<PhysicalPage>, opts: BookOpenOptions) {
        self.events.emit(CoreEvent::LoadProgress(0.0));
        let page_count = pages.len();
        self.list.write().set_physical(pages);
        self.frames.lock().clear_cache();
        self.events.emit(CoreEvent::BookOpen(BookInfo {
            locator: book_locator.into(),
            is_archive: opts.is_archive,
            page_count,
        }));
        self.events.emit(CoreEvent::LoadProgress(1.0));
        let start = self.list.read().clamp(opts.start_index);
        self.go_to_index(start, 1);
    }

    /// Close the book: drop the virtual page list, frame cache and
    /// in-flight preload work; clear the memory tier of every cache
    /// namespace so a closed book doesn't keep occupying RAM. Durable
    /// copies, where configured, survive and rehydrate on the next open.
    pub async fn close(self: &Arc<Self>) {
        self.preload.cancel_all().await;
        self.preload.clear_memory_only().await;
        *self.list.write() = VirtualPageList::new();
        self.frames.lock().clear_cache();
        *self.position.lock() = PagePosition::NULL;
        self.events.emit(CoreEvent::BookClose);
    }

    /// Current position, or the null sentinel if no book is open / the
    /// book is empty.
    pub fn position(&self) -> PagePosition {
        *self.position.lock()
    }

    /// The frame currently displayed, if any.
    pub fn current_frame(&self) -> Option<Arc<PageFrame>> {
        let pos = self.position();
        if pos.is_null() {
            return None;
        }
        let direction = *self.direction.lock();
        self.frames.lock().build(&self.list.read(), pos, direction)
    }

    /// Navigate to an explicit virtual index, clamped into range.
    pub fn go_to(self: &Arc<Self>, virtual_index: i64, direction: i8) {
        let vi = self.list.read().clamp(virtual_index);
        self.go_to_index(vi, direction);
    }

    /// Advance to the frame after the current one.
    pub fn next_frame(self: &Arc<Self>) -> Option<Arc<PageFrame>> {
        let current = self.current_frame()?;
        let direction = 1;
        let next = self.frames.lock().next_frame(&self.list.read(), &current, direction)?;
        self.adopt_frame(&next, direction);
        Some(next)
    }

    /// Retreat to the frame before the current one.
    pub fn prev_frame(self: &Arc<Self>) -> Option<Arc<PageFrame>> {
        let current = self.current_frame()?;
        let direction = -1;
        let next = self.frames.lock().next_frame(&self.list.read(), &current, direction)?;
        self.adopt_frame(&next, direction);
        Some(next)
    }

    /// Jump to the book's first virtual page.
    pub fn first(self: &Arc<Self>) {
        if let Some(vi) = self.list.read().first() {
            self.go_to_index(vi, 1);
        }
    }

    /// Jump to the book's last virtual page.
    pub fn last(self: &Arc<Self>) {
        if let Some(vi) = self.list.read().last() {
            self.go_to_index(vi, -1);
        }
    }

    /// Jump forward to the start of the next folder, if any.
    pub fn next_folder(self: &Arc<Self>) {
        let current = self.position().index.max(0) as usize;
        if let Some(vi) = self.list.read().next_folder_index(current) {
            self.go_to_index(vi, 1);
        }
    }

    /// Jump backward to the start of the previous folder, if any.
    pub fn prev_folder(self: &Arc<Self>) {
        let current = self.position().index.max(0) as usize;
        if let Some(vi) = self.list.read().prev_folder_index(current) {
            self.go_to_index(vi, -1);
        }
    }

    /// Apply a virtual-list config patch, rebuilding layout state only if
    /// the patch actually changed something that affects the rebuild.
    pub fn set_list_config(self: &Arc<Self>, patch: VirtualListConfigPatch) {
        let outcome = self.list.write().set_config(patch);
        self.after_rebuild(outcome);
    }

    /// Change sort mode/seed.
    pub fn set_sort_mode(self: &Arc<Self>, mode: SortMode, seed: Option<u32>) {
        let outcome = self.list.write().set_sort_mode(mode, seed);
        self.after_rebuild(outcome);
    }

    /// Change the search filter.
    pub fn set_search(self: &Arc<Self>, keyword: &str) {
        let outcome = self.list.write().set_search(keyword);
        self.after_rebuild(outcome);
    }

    /// Report updated natural sizes for physical pages (e.g. once a full
    /// decode reveals true dimensions after a provisional open).
    pub fn update_sizes(self: &Arc<Self>, updates: &[(usize, u32, u32)]) {
        let outcome = self.list.write().update_sizes(updates);
        self.after_rebuild(outcome);
    }

    /// Replace the frame layout configuration.
    pub fn set_frame_config(&self, config: FrameConfig) {
        self.frames.lock().set_config(config);
    }

    /// Replace the preload configuration.
    pub fn set_preload_config(self: &Arc<Self>, config: PreloadConfig) {
        self.preload.set_config(config);
    }

    /// Pause preload scheduling.
    pub fn pause_preload(&self) {
        self.preload.pause();
    }

    /// Resume preload scheduling.
    pub fn resume_preload(self: &Arc<Self>) {
        self.preload.resume();
    }

    /// Fetch one artifact on demand, bypassing the focus window.
    pub async fn request_artifact(
        self: &Arc<Self>,
        kind: ArtifactKind,
        virtual_index: usize,
    ) -> Result<Bytes, PreloadError> {
        self.preload.request(kind, virtual_index, None).await
    }

    /// Drop cached artifacts (`None` clears every kind).
    pub async fn clear_cache(&self, kind: Option<ArtifactKind>) {
        self.preload.clear_cache(kind).await;
    }

    fn go_to_index(self: &Arc<Self>, vi: usize, direction: i8) {
        *self.direction.lock() = direction;
        let part = self
            .list
            .read()
            .get(vi)
            .map(|vp| vp.part.as_u8())
            .unwrap_or(0);
        *self.position.lock() = PagePosition {
            index: vi as i64,
            part,
        };
        let frame = self.current_frame();
        self.events.emit(CoreEvent::PageChange(vi, frame));
        self.preload.set_focus(vi as i64);
        self.events.emit(CoreEvent::PreloadFocusChange(vi as i64));
    }

    fn adopt_frame(self: &Arc<Self>, frame: &Arc<PageFrame>, direction: i8) {
        *self.direction.lock() = direction;
        let focus_pos = if direction >= 0 { frame.range.max } else { frame.range.min };
        *self.position.lock() = focus_pos;
        let index = focus_pos.index.max(0) as usize;
        self.events.emit(CoreEvent::PageChange(index, Some(frame.clone())));
        self.preload.set_focus(focus_pos.index);
        self.events.emit(CoreEvent::PreloadFocusChange(focus_pos.index));
    }

    fn after_rebuild(self: &Arc<Self>, outcome: RebuildOutcome) {
        if !outcome.did_rebuild() {
            return;
        }
        self.frames.lock().clear_cache();
        self.events.emit(CoreEvent::PagesRebuilt);
        let vi = self.list.read().clamp(self.position().index);
        self.go_to_index(vi, 1);
    }
}
