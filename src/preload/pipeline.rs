//! Focus-window preload scheduling over image, thumbnail and upscale
//! artifacts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::cache::CacheNamespace;
use crate::config::PreloadConfig;
use crate::error::{ArtifactKind, PreloadError};
use crate::preload::loaders::{ImageLoader, LoadTarget, ThumbnailLoader, Upscaler};
use crate::preload::scheduler::Scheduler;
use crate::preload::task::{Fingerprint, PreloadTask, TaskStatus};
use crate::virtual_list::VirtualPageList;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The three artifact-specific caches a pipeline writes into.
pub struct PreloadCaches {
    /// Full-resolution image cache.
    pub images: Arc<CacheNamespace<Bytes>>,
    /// Thumbnail cache.
    pub thumbnails: Arc<CacheNamespace<Bytes>>,
    /// Upscale cache.
    pub upscales: Arc<CacheNamespace<Bytes>>,
}

struct Loaders {
    image: Option<Arc<dyn ImageLoader>>,
    thumbnail: Option<Arc<dyn ThumbnailLoader>>,
    upscale: Option<Arc<dyn Upscaler>>,
}

/// Maintains a sliding window of preloaded artifacts around a focus virtual
/// index, deduplicating concurrent identical requests and honoring
/// per-kind concurrency caps.
///
/// Always constructed as `Arc<Self>` — background loader bodies hold a
/// `Weak<Self>` back-reference, mirroring `CacheManager`'s sweep task.
pub struct PreloadPipeline {
    list: Arc<RwLock<VirtualPageList>>,
    config: RwLock<PreloadConfig>,
    focus: AtomicI64,
    paused: AtomicBool,
    scheduler: Scheduler,
    caches: PreloadCaches,
    loaders: RwLock<Loaders>,
}

impl PreloadPipeline {
    /// Construct a pipeline over a shared virtual page list and its three
    /// artifact caches, with no loaders installed yet.
    pub fn new(list: Arc<RwLock<VirtualPageList>>, config: PreloadConfig, caches: PreloadCaches) -> Arc<Self> {
        Arc::new(Self {
            list,
            config: RwLock::new(config),
            focus: AtomicI64::new(0),
            paused: AtomicBool::new(false),
            scheduler: Scheduler::new(),
            caches,
            loaders: RwLock::new(Loaders {
                image: None,
                thumbnail: None,
                upscale: None,
            }),
        })
    }

    /// Install (or replace) the image loader.
    pub fn set_image_loader(&self, loader: Arc<dyn ImageLoader>) {
        self.loaders.write().image = Some(loader);
    }

    /// Install (or replace) the thumbnail loader.
    pub fn set_thumbnail_loader(&self, loader: Arc<dyn ThumbnailLoader>) {
        self.loaders.write().thumbnail = Some(loader);
    }

    /// Install (or replace) the upscaler.
    pub fn set_upscaler(&self, upscaler: Arc<dyn Upscaler>) {
        self.loaders.write().upscale = Some(upscaler);
    }

    /// Current preload configuration.
    pub fn config(&self) -> PreloadConfig {
        *self.config.read()
    }

    /// Replace the preload configuration and recompute the window.
    pub fn set_config(self: &Arc<Self>, config: PreloadConfig) {
        *self.config.write() = config;
        self.recalculate();
    }

    /// Current focus virtual index.
    pub fn focus(&self) -> i64 {
        self.focus.load(Ordering::SeqCst)
    }

    /// Move the focus window; a no-op at the same index, otherwise
    /// recomputes the wanted fingerprint set and reschedules.
    pub fn set_focus(self: &Arc<Self>, virtual_index: i64) {
        if self.focus.swap(virtual_index, Ordering::SeqCst) == virtual_index {
            return;
        }
        self.recalculate();
    }

    /// Suspend scheduling new work; in-flight tasks keep running.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume scheduling and immediately recompute the window.
    pub fn resume(self: &Arc<Self>) {
        self.paused.store(false, Ordering::SeqCst);
        self.recalculate();
    }

    /// Cancel every live task without touching cache contents.
    pub async fn cancel_all(&self) {
        self.scheduler.cancel_all().await;
    }

    /// Drop cached artifacts. `Some(kind)` clears just that namespace;
    /// `Upscale` is the only kind whose clear also cancels in-flight work,
    /// since a stale upscale is expensive to redo and never implicitly
    /// reloaded the way images/thumbnails are. `None` clears every
    /// namespace.
    pub async fn clear_cache(&self, kind: Option<ArtifactKind>) {
        match kind {
            Some(ArtifactKind::Image) => self.caches.images.clear().await,
            Some(ArtifactKind::Thumbnail) => self.caches.thumbnails.clear().await,
            Some(ArtifactKind::Upscale) => {
                self.caches.upscales.clear().await;
                let wanted = HashSet::new();
                self.scheduler.cancel_missing(&wanted).await;
            }
            None => {
                self.caches.images.clear().await;
                self.caches.thumbnails.clear().await;
                self.caches.upscales.clear().await;
            }
        }
    }

    /// Drop the memory tier of every namespace, leaving durable copies (if
    /// any) untouched. Used by `BookCoordinator::close` so a closed book
    /// doesn't keep occupying RAM while still allowing a fast reopen from
    /// durable storage.
    pub async fn clear_memory_only(&self) {
        self.caches.images.clear_memory();
        self.caches.thumbnails.clear_memory();
        self.caches.upscales.clear_memory();
    }

    fn namespace(&self, kind: ArtifactKind) -> &Arc<CacheNamespace<Bytes>> {
        match kind {
            ArtifactKind::Image => &self.caches.images,
            ArtifactKind::Thumbnail => &self.caches.thumbnails,
            ArtifactKind::Upscale => &self.caches.upscales,
        }
    }

    /// Fetch one artifact: a cache hit returns immediately; otherwise joins
    /// (or creates) its task and awaits the single-flight result. `priority`
    /// overrides the distance-based default for an explicit, user-driven
    /// request (e.g. "upscale this page now").
    pub async fn request(
        self: &Arc<Self>,
        kind: ArtifactKind,
        virtual_index: usize,
        priority: Option<i64>,
    ) -> Result<Bytes, PreloadError> {
        let fp = Fingerprint::new(kind, virtual_index);
        if let Some(bytes) = self.namespace(kind).get(&fp.cache_key()).await {
            return Ok(bytes);
        }
        let has_loader = {
            let loaders = self.loaders.read();
            match kind {
                ArtifactKind::Image => loaders.image.is_some(),
                ArtifactKind::Thumbnail => loaders.thumbnail.is_some(),
                ArtifactKind::Upscale => loaders.upscale.is_some(),
            }
        };
        if !has_loader {
            return Err(PreloadError::MissingLoader(kind));
        }
        let p = priority.unwrap_or_else(|| fp.priority_for_distance(0));
        let task = self.scheduler.ensure_task(fp, p, now_ms()).await;
        self.spawn_if_pending(task.clone());
        task.future().await
    }

    /// Recompute the focus window and (re)schedule work to match it.
    /// Cancels tasks for fingerprints that fell outside the window, ensures
    /// a task exists for each fingerprint still wanted, then starts as many
    /// pending tasks as each kind's concurrency cap allows.
    pub fn recalculate(self: &Arc<Self>) {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.recalculate_async().await;
        });
    }

    async fn recalculate_async(self: Arc<Self>) {
        let length = self.list.read().length();
        if length == 0 {
            self.scheduler.cancel_all().await;
            return;
        }
        let focus = self.focus.load(Ordering::SeqCst).clamp(0, length as i64 - 1);
        let cfg = *self.config.read();
        let lo = (focus - cfg.behind as i64).max(0) as usize;
        let hi = ((focus + cfg.ahead as i64).min(length as i64 - 1)) as usize;

        let mut wanted = HashSet::new();
        let mut to_ensure = Vec::new();
        for vi in lo..=hi {
            let distance = (vi as i64 - focus).unsigned_abs() as i64;
            for kind in [ArtifactKind::Image, ArtifactKind::Thumbnail] {
                let fp = Fingerprint::new(kind, vi);
                wanted.insert(fp);
                to_ensure.push((fp, fp.priority_for_distance(distance)));
            }
            if cfg.auto_upscale {
                let fp = Fingerprint::new(ArtifactKind::Upscale, vi);
                wanted.insert(fp);
                to_ensure.push((fp, fp.priority_for_distance(distance)));
            }
        }

        self.scheduler.cancel_missing(&wanted).await;

        for (fp, priority) in to_ensure {
            if self.namespace(fp.kind).has(&fp.cache_key()) {
                continue;
            }
            let task = self.scheduler.ensure_task(fp, priority, now_ms()).await;
            self.spawn_if_pending(task);
        }

        self.start_ready_tasks().await;
    }

    async fn start_ready_tasks(self: &Arc<Self>) {
        let cfg = *self.config.read();
        for kind in [ArtifactKind::Image, ArtifactKind::Thumbnail, ArtifactKind::Upscale] {
            let cap = match kind {
                ArtifactKind::Image => cfg.max_concurrent_images,
                ArtifactKind::Thumbnail => cfg.max_concurrent_thumbnails,
                ArtifactKind::Upscale => cfg.max_concurrent_upscale,
            };
            let running = self.scheduler.loading_count(kind).await;
            if running >= cap {
                continue;
            }
            let slots = cap - running;
            let pending = self.scheduler.pending_by_kind(kind).await;
            for task in pending.into_iter().take(slots) {
                self.spawn_if_pending(task);
            }
        }
    }

    fn spawn_if_pending(self: &Arc<Self>, task: Arc<PreloadTask>) {
        if task.status() != TaskStatus::Pending {
            return;
        }
        task.set_status(TaskStatus::Loading);
        let this = self.clone();
        tokio::spawn(async move {
            this.run_task(task).await;
        });
    }

    async fn run_task(self: Arc<Self>, task: Arc<PreloadTask>) {
        let fp = task.fingerprint;
        if task.cancel.is_cancelled() {
            self.scheduler.retire(fp).await;
            return;
        }
        let target = {
            let list = self.list.read();
            list.physical_of(fp.virtual_index).map(|p| LoadTarget {
                virtual_index: fp.virtual_index,
                locator: p.locator.clone(),
                crop: list.get(fp.virtual_index).and_then(|vp| vp.crop),
            })
        };
        let Some(target) = target else {
            task.set_status(TaskStatus::Cancelled);
            task.complete(Err(PreloadError::Cancelled));
            self.scheduler.retire(fp).await;
            return;
        };

        let result = self.run_loader(fp.kind, &target, task.cancel.clone()).await;

        match &result {
            Ok(bytes) => {
                self.namespace(fp.kind).set(&fp.cache_key(), bytes.clone(), None).await;
                task.set_status(TaskStatus::Done);
                #[cfg(feature = "std")]
                log::debug!("preload: loaded {} for vi={}", fp.kind, fp.virtual_index);
            }
            Err(PreloadError::Cancelled) => {
                task.set_status(TaskStatus::Cancelled);
            }
            Err(e) => {
                task.set_status(TaskStatus::Error);
                #[cfg(feature = "std")]
                log::warn!("preload: {} for vi={} failed: {}", fp.kind, fp.virtual_index, e);
            }
        }
        task.complete(result);
        self.scheduler.retire(fp).await;
        self.start_ready_tasks().await;
    }

    async fn run_loader(
        self: &Arc<Self>,
        kind: ArtifactKind,
        target: &LoadTarget,
        cancel: crate::preload::task::CancelHandle,
    ) -> Result<Bytes, PreloadError> {
        match kind {
            ArtifactKind::Image => {
                let loader = self.loaders.read().image.clone();
                match loader {
                    Some(l) => l.load(target, cancel).await,
                    None => Err(PreloadError::MissingLoader(kind)),
                }
            }
            ArtifactKind::Thumbnail => {
                let loader = self.loaders.read().thumbnail.clone();
                match loader {
                    Some(l) => l.load(target, cancel).await,
                    None => Err(PreloadError::MissingLoader(kind)),
                }
            }
            ArtifactKind::Upscale => {
                let upscaler = self.loaders.read().upscale.clone();
                let Some(upscaler) = upscaler else {
                    return Err(PreloadError::MissingLoader(kind));
                };
                // An upscale is derived from the image artifact, so it is
                // requested through the same pipeline rather than loaded
                // independently.
                let image = self.request(ArtifactKind::Image, target.virtual_index, None).await?;
                upscaler.upscale(target, image, cancel).await
            }
        }
    }
}
