//! Configuration structs for every component.

/// Single/wide page layout mode for both the virtual page list and the
/// frame builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageMode {
    /// One virtual page per frame by default.
    Single,
    /// Two virtual pages per frame by default.
    Wide,
}

/// Reading order, affects split-half ordering and two-page layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadingOrder {
    /// Left-to-right.
    Ltr,
    /// Right-to-left.
    Rtl,
}

/// Configuration for the virtual page list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirtualListConfig {
    /// Split landscape pages into two virtual halves.
    pub split_landscape: bool,
    /// Aspect-ratio threshold above which a page is split (default 1.0).
    pub split_threshold: f64,
    /// Single/wide page mode.
    pub page_mode: PageMode,
    /// Reading order.
    pub reading_order: ReadingOrder,
    /// Carried through for the frame builder; does not affect this list's
    /// own rebuild.
    pub single_first_page: bool,
    /// Carried through for the frame builder; does not affect this list's
    /// own rebuild.
    pub single_last_page: bool,
    /// Carried through for the frame builder; does not affect this list's
    /// own rebuild.
    pub support_wide_page: bool,
}

impl Default for VirtualListConfig {
    fn default() -> Self {
        Self {
            split_landscape: false,
            split_threshold: 1.0,
            page_mode: PageMode::Single,
            reading_order: ReadingOrder::Ltr,
            single_first_page: false,
            single_last_page: false,
            support_wide_page: false,
        }
    }
}

/// Partial patch applied field-by-field by `set_config`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VirtualListConfigPatch {
    /// New value for `split_landscape`, if changing.
    pub split_landscape: Option<bool>,
    /// New value for `split_threshold`, if changing.
    pub split_threshold: Option<f64>,
    /// New value for `page_mode`, if changing.
    pub page_mode: Option<PageMode>,
    /// New value for `reading_order`, if changing.
    pub reading_order: Option<ReadingOrder>,
    /// New value for `single_first_page`, if changing.
    pub single_first_page: Option<bool>,
    /// New value for `single_last_page`, if changing.
    pub single_last_page: Option<bool>,
    /// New value for `support_wide_page`, if changing.
    pub support_wide_page: Option<bool>,
}

impl VirtualListConfig {
    /// Apply a patch, returning `true` if a field that affects this list's
    /// own rebuild algorithm changed.
    pub fn apply(&mut self, patch: VirtualListConfigPatch) -> bool {
        let mut layout_changed = false;
        if let Some(v) = patch.split_landscape {
            layout_changed |= v != self.split_landscape;
            self.split_landscape = v;
        }
        if let Some(v) = patch.split_threshold {
            layout_changed |= v != self.split_threshold;
            self.split_threshold = v;
        }
        if let Some(v) = patch.page_mode {
            layout_changed |= v != self.page_mode;
            self.page_mode = v;
        }
        if let Some(v) = patch.reading_order {
            layout_changed |= v != self.reading_order;
            self.reading_order = v;
        }
        if let Some(v) = patch.single_first_page {
            self.single_first_page = v;
        }
        if let Some(v) = patch.single_last_page {
            self.single_last_page = v;
        }
        if let Some(v) = patch.support_wide_page {
            self.support_wide_page = v;
        }
        layout_changed
    }
}

/// Configuration for the page frame builder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameConfig {
    /// 1 or 2 virtual pages per frame.
    pub frame_page_size: u8,
    /// Force single-element frames for landscape first elements.
    pub support_wide_page: bool,
    /// Force a single-element frame at the very first virtual page.
    pub single_first_page: bool,
    /// Force a single-element frame at the very last virtual page.
    pub single_last_page: bool,
    /// Pad a trailing odd page with a dummy clone instead of going single.
    pub insert_dummy_page: bool,
    /// Reading order.
    pub reading_order: ReadingOrder,
    /// When true, navigation wraps around and frames never report terminal
    /// bits.
    pub is_loop: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_page_size: 1,
            support_wide_page: false,
            single_first_page: false,
            single_last_page: false,
            insert_dummy_page: false,
            reading_order: ReadingOrder::Ltr,
            is_loop: false,
        }
    }
}

/// Configuration for the preload pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreloadConfig {
    /// How many virtual indices ahead of focus to keep warm.
    pub ahead: usize,
    /// How many virtual indices behind focus to keep warm.
    pub behind: usize,
    /// Concurrency cap for `image` loads.
    pub max_concurrent_images: usize,
    /// Concurrency cap for `thumbnail` loads.
    pub max_concurrent_thumbnails: usize,
    /// Concurrency cap for `upscale` loads.
    pub max_concurrent_upscale: usize,
    /// Whether `upscale` tasks are scheduled automatically within the
    /// focus window, or only on explicit `request`.
    pub auto_upscale: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            ahead: 2,
            behind: 1,
            max_concurrent_images: 2,
            max_concurrent_thumbnails: 4,
            max_concurrent_upscale: 1,
            auto_upscale: false,
        }
    }
}

/// Per-kind priority offset added to distance-from-focus.
pub fn kind_priority_offset(kind: crate::error::ArtifactKind) -> i64 {
    use crate::error::ArtifactKind::*;
    match kind {
        Image => 0,
        Thumbnail => 50,
        Upscale => 100,
    }
}

/// Options accompanying `BookCoordinator::open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookOpenOptions {
    /// Whether the book's entries come from an archive rather than a plain
    /// folder. Carried through to `BookInfo`; doesn't affect pagination.
    pub is_archive: bool,
    /// Virtual index to land on once the book is built, clamped into
    /// range. Lets a caller resume a book where a previous session left
    /// off instead of always starting at the first page.
    pub start_index: i64,
}

impl Default for BookOpenOptions {
    fn default() -> Self {
        Self {
            is_archive: false,
            start_index: 0,
        }
    }
}

/// Per-namespace cache configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheNamespaceConfig {
    /// Namespace name, used as the durable store name too unless
    /// `store_name` is set.
    pub name: String,
    /// Total byte budget for the memory tier.
    pub byte_cap: u64,
    /// Total item-count budget for the memory tier.
    pub item_cap: usize,
    /// Time-to-live in milliseconds; `0` means no expiry.
    pub ttl_ms: u64,
    /// Whether this namespace shadows a durable store.
    pub persistent: bool,
    /// Durable store name, when `persistent`.
    pub store_name: Option<String>,
}

impl CacheNamespaceConfig {
    /// Construct a namespace config with the documented defaults
    /// (50 MiB / 1000 items / no TTL / not persistent).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            byte_cap: 50 * 1024 * 1024,
            item_cap: 1000,
            ttl_ms: 0,
            persistent: false,
            store_name: None,
        }
    }

    /// Builder-style: mark this namespace persistent, shadowed by `store`.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.persistent = true;
        self.store_name = Some(store.into());
        self
    }

    /// Builder-style: set an explicit TTL in milliseconds.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Builder-style: set explicit byte/item caps.
    pub fn with_caps(mut self, byte_cap: u64, item_cap: usize) -> Self {
        self.byte_cap = byte_cap;
        self.item_cap = item_cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_layout_field_triggers_rebuild() {
        let mut cfg = VirtualListConfig::default();
        let changed = cfg.apply(VirtualListConfigPatch {
            split_landscape: Some(true),
            ..Default::default()
        });
        assert!(changed);
        assert!(cfg.split_landscape);
    }

    #[test]
    fn test_patch_non_layout_field_no_rebuild() {
        let mut cfg = VirtualListConfig::default();
        let changed = cfg.apply(VirtualListConfigPatch {
            single_first_page: Some(true),
            ..Default::default()
        });
        assert!(!changed);
        assert!(cfg.single_first_page);
    }

    #[test]
    fn test_patch_idempotent_second_call_reports_no_change() {
        let mut cfg = VirtualListConfig::default();
        let patch = VirtualListConfigPatch {
            page_mode: Some(PageMode::Wide),
            ..Default::default()
        };
        assert!(cfg.apply(patch));
        assert!(!cfg.apply(patch));
    }

    #[test]
    fn test_namespace_config_defaults() {
        let cfg = CacheNamespaceConfig::new("images");
        assert_eq!(cfg.byte_cap, 50 * 1024 * 1024);
        assert_eq!(cfg.item_cap, 1000);
        assert_eq!(cfg.ttl_ms, 0);
        assert!(!cfg.persistent);
    }
}
