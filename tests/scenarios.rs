//! End-to-end scenarios exercising the virtual list, frame builder and
//! preload pipeline together through `BookCoordinator`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookcore::{
    ArtifactKind, BookCoordinator, BookOpenOptions, CacheNamespace, CacheNamespaceConfig, CancelHandle,
    FrameConfig, ImageLoader, LoadTarget, PageKind, PageLocator, PhysicalPage, PreloadCaches,
    PreloadConfig, PreloadError, ReadingOrder, VirtualListConfigPatch,
};
use bytes::Bytes;

fn page(index: usize, name: &str, w: u32, h: u32) -> PhysicalPage {
    PhysicalPage {
        index,
        name: name.to_string(),
        locator: PageLocator::ArchiveEntry(name.to_string()),
        width: w,
        height: h,
        modified: None,
        file_size: 0,
        kind: PageKind::Image,
        tombstone: false,
    }
}

struct CountingImageLoader {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageLoader for CountingImageLoader {
    async fn load(&self, target: &LoadTarget, _cancel: CancelHandle) -> Result<Bytes, PreloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("img-{}", target.virtual_index)))
    }
}

struct SlowImageLoader;

#[async_trait]
impl ImageLoader for SlowImageLoader {
    async fn load(&self, target: &LoadTarget, cancel: CancelHandle) -> Result<Bytes, PreloadError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                Ok(Bytes::from(format!("img-{}", target.virtual_index)))
            }
            _ = cancel.cancelled() => Err(PreloadError::Cancelled),
        }
    }
}

#[tokio::test]
async fn scenario_split_landscape_single_rtl() {
    let coordinator = BookCoordinator::new(FrameConfig::default(), PreloadConfig::default());
    coordinator.set_image_loader(Arc::new(CountingImageLoader {
        calls: AtomicUsize::new(0),
    }));
    coordinator.set_list_config(VirtualListConfigPatch {
        split_landscape: Some(true),
        split_threshold: Some(1.0),
        reading_order: Some(ReadingOrder::Rtl),
        ..Default::default()
    });
    coordinator.open(
        "book",
        vec![
            page(0, "a", 100, 100),
            page(1, "b", 200, 100),
            page(2, "c", 100, 100),
        ],
        BookOpenOptions::default(),
    );

    let mut visited = vec![coordinator.position().index];
    while coordinator.next_frame().is_some() {
        visited.push(coordinator.position().index);
    }
    assert_eq!(visited, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn scenario_wide_with_wide_page_exception() {
    let coordinator = BookCoordinator::new(
        FrameConfig {
            frame_page_size: 2,
            support_wide_page: true,
            ..Default::default()
        },
        PreloadConfig::default(),
    );
    coordinator.open(
        "book",
        vec![
            page(0, "a", 100, 100),
            page(1, "b", 100, 100),
            page(2, "c", 200, 100), // landscape
            page(3, "d", 100, 100),
            page(4, "e", 100, 100),
        ],
        BookOpenOptions::default(),
    );

    let mut sets = Vec::new();
    loop {
        let frame = coordinator.current_frame().unwrap();
        sets.push(frame.elements.iter().map(|e| e.virtual_index).collect::<Vec<_>>());
        if coordinator.next_frame().is_none() {
            break;
        }
    }
    assert_eq!(sets, vec![vec![0, 1], vec![2], vec![3, 4]]);
}

#[tokio::test]
async fn scenario_preload_window_follows_focus() {
    let coordinator = BookCoordinator::new(
        FrameConfig::default(),
        PreloadConfig {
            ahead: 1,
            behind: 0,
            max_concurrent_images: 4,
            max_concurrent_thumbnails: 4,
            max_concurrent_upscale: 1,
            auto_upscale: false,
        },
    );
    coordinator.set_image_loader(Arc::new(CountingImageLoader {
        calls: AtomicUsize::new(0),
    }));
    coordinator.open(
        "book",
        (0..10).map(|i| page(i, &format!("p{i}"), 10, 10)).collect(),
        BookOpenOptions::default(),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    coordinator.request_artifact(ArtifactKind::Image, 0).await.unwrap();
    coordinator.request_artifact(ArtifactKind::Image, 1).await.unwrap();

    coordinator.go_to(5, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.request_artifact(ArtifactKind::Image, 5).await.unwrap();
    coordinator.request_artifact(ArtifactKind::Image, 6).await.unwrap();
}

#[tokio::test]
async fn scenario_concurrent_requests_deduplicate_to_one_load() {
    let coordinator = BookCoordinator::new(FrameConfig::default(), PreloadConfig::default());
    let loader = Arc::new(CountingImageLoader {
        calls: AtomicUsize::new(0),
    });
    coordinator.set_image_loader(loader.clone());
    coordinator.open(
        "book",
        vec![page(0, "a", 10, 10), page(1, "b", 10, 10)],
        BookOpenOptions::default(),
    );

    let c1 = coordinator.clone();
    let c2 = coordinator.clone();
    let (a, b) = tokio::join!(
        c1.request_artifact(ArtifactKind::Image, 1),
        c2.request_artifact(ArtifactKind::Image, 1)
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_cache_eviction_respects_item_cap() {
    let caches = PreloadCaches {
        images: Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("image").with_caps(u64::MAX, 2),
            None,
        )),
        thumbnails: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("thumbnail"), None)),
        upscales: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("upscale"), None)),
    };
    let loader = Arc::new(CountingImageLoader {
        calls: AtomicUsize::new(0),
    });
    let coordinator = BookCoordinator::with_caches(FrameConfig::default(), PreloadConfig::default(), caches);
    coordinator.set_image_loader(loader.clone());
    coordinator.open(
        "book",
        (0..5).map(|i| page(i, &format!("p{i}"), 10, 10)).collect(),
        BookOpenOptions::default(),
    );

    for vi in 0..5 {
        coordinator.request_artifact(ArtifactKind::Image, vi).await.unwrap();
    }
    assert_eq!(loader.calls.load(Ordering::SeqCst), 5);

    // page 0 was evicted from the 2-item memory cache long ago; requesting
    // it again must re-invoke the loader rather than return a stale hit.
    coordinator.request_artifact(ArtifactKind::Image, 0).await.unwrap();
    assert_eq!(loader.calls.load(Ordering::SeqCst), 6);

    // page 4, the most recently loaded, is still warm.
    let before = loader.calls.load(Ordering::SeqCst);
    coordinator.request_artifact(ArtifactKind::Image, 4).await.unwrap();
    assert_eq!(loader.calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn scenario_ttl_expiry_forces_reload() {
    let caches = PreloadCaches {
        images: Arc::new(CacheNamespace::new(
            CacheNamespaceConfig::new("image").with_ttl_ms(20),
            None,
        )),
        thumbnails: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("thumbnail"), None)),
        upscales: Arc::new(CacheNamespace::new(CacheNamespaceConfig::new("upscale"), None)),
    };
    let coordinator = BookCoordinator::with_caches(FrameConfig::default(), PreloadConfig::default(), caches);
    let loader = Arc::new(CountingImageLoader {
        calls: AtomicUsize::new(0),
    });
    coordinator.set_image_loader(loader.clone());
    coordinator.open("book", vec![page(0, "a", 10, 10)], BookOpenOptions::default());

    coordinator.request_artifact(ArtifactKind::Image, 0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    coordinator.request_artifact(ArtifactKind::Image, 0).await.unwrap();
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn scenario_cancel_on_close_stops_in_flight_loads() {
    let coordinator = BookCoordinator::new(FrameConfig::default(), PreloadConfig::default());
    coordinator.set_image_loader(Arc::new(SlowImageLoader));
    coordinator.open(
        "book",
        vec![page(0, "a", 10, 10), page(1, "b", 10, 10)],
        BookOpenOptions::default(),
    );

    let c = coordinator.clone();
    let handle = tokio::spawn(async move { c.request_artifact(ArtifactKind::Image, 1).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.close().await;

    let result = handle.await.unwrap();
    assert_eq!(result, Err(PreloadError::Cancelled));
}
