//! Page Frame Builder: turns a `(position, direction)` pair into the
//! display unit actually rendered — one or two virtual pages laid out
//! side by side, scaled to a common height.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::config::{FrameConfig, ReadingOrder};
use crate::model::{CropRect, PagePosition, PageRange, Part};
use crate::virtual_list::VirtualPageList;

const DEFAULT_CACHE_CAP: usize = 512;

/// Cache key for a built frame: `(generation, index, part, direction)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct FrameKey {
    generation: u64,
    index: i64,
    part: u8,
    direction: i8,
}

/// Which end(s) of the book a frame touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// Neither end.
    None,
    /// Contains the book's first position.
    First,
    /// Contains the book's last position.
    Last,
    /// Contains both (0- or 1-length book).
    Both,
}

impl Terminal {
    fn combine(is_first: bool, is_last: bool) -> Terminal {
        match (is_first, is_last) {
            (true, true) => Terminal::Both,
            (true, false) => Terminal::First,
            (false, true) => Terminal::Last,
            (false, false) => Terminal::None,
        }
    }
}

/// One virtual page's placement within a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameElement {
    /// The virtual index this element renders, or the index it was
    /// cloned from when `dummy` is set.
    pub virtual_index: usize,
    /// The physical page backing this element.
    pub physical_index: usize,
    /// Which half of the physical page, if divided.
    pub part: Part,
    /// Crop applied, if any.
    pub crop: Option<CropRect>,
    /// Unscaled rendered width.
    pub raw_width: f64,
    /// Unscaled rendered height.
    pub raw_height: f64,
    /// Per-element scale applied so every element in the frame shares the
    /// tallest rendered height.
    pub scale: f64,
    /// Running horizontal offset within the frame.
    pub offset_x: f64,
    /// `true` for a synthesized clone of the first element used to pad a
    /// trailing odd page (`insert_dummy_page`).
    pub dummy: bool,
    /// This element's own single-position range.
    pub range: PageRange,
}

impl FrameElement {
    /// Rendered (post-scale) size.
    pub fn rendered_size(&self) -> (f64, f64) {
        (self.raw_width * self.scale, self.raw_height * self.scale)
    }
}

/// The unit actually displayed: one or two `FrameElement`s.
#[derive(Clone, Debug, PartialEq)]
pub struct PageFrame {
    /// Ordered per the effective reading direction.
    pub elements: Vec<FrameElement>,
    /// Union of the elements' ranges.
    pub range: PageRange,
    /// The traversal direction this frame was built for.
    pub direction: i8,
    /// `(Σ rendered widths, max rendered height)`.
    pub composed_size: (f64, f64),
    /// Which end(s) of the book this frame touches.
    pub terminal: Terminal,
}

/// Builds and caches `PageFrame`s under a `FrameConfig`.
pub struct PageFrameBuilder {
    config: FrameConfig,
    cache: LruCache<FrameKey, Arc<PageFrame>>,
}

impl PageFrameBuilder {
    /// A builder with the default 512-entry cache.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            cache: LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAP).unwrap()),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> FrameConfig {
        self.config
    }

    /// Replace the configuration; clears the cache if anything changed,
    /// since every knob here affects layout and a stale frame built under
    /// the old configuration would be wrong.
    pub fn set_config(&mut self, config: FrameConfig) -> bool {
        if config == self.config {
            return false;
        }
        self.config = config;
        self.cache.clear();
        true
    }

    /// Drop every cached frame.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Build (or fetch from cache) the frame at `(position, direction)`.
    /// Returns `None` when loop mode is off and `position` is out of
    /// range for `list`.
    pub fn build(
        &mut self,
        list: &VirtualPageList,
        position: PagePosition,
        direction: i8,
    ) -> Option<Arc<PageFrame>> {
        let len = list.length();
        if len == 0 || position.is_null() {
            return None;
        }

        let idx = if self.config.is_loop {
            position.index.rem_euclid(len as i64)
        } else if position.index < 0 || position.index >= len as i64 {
            return None;
        } else {
            position.index
        };

        let vp = list.get(idx as usize)?;
        let part = if vp.divided {
            vp.part.as_u8()
        } else if direction >= 0 {
            0
        } else {
            1
        };

        let key = FrameKey {
            generation: list.generation(),
            index: idx,
            part,
            direction,
        };
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached.clone());
        }

        let phys = list.physical_of(idx as usize)?;
        let (rw, rh) = vp.raw_size(phys.width, phys.height);
        let first = FrameElement {
            virtual_index: idx as usize,
            physical_index: vp.physical_index,
            part: vp.part,
            crop: vp.crop,
            raw_width: rw as f64,
            raw_height: rh as f64,
            scale: 1.0,
            offset_x: 0.0,
            dummy: false,
            range: PageRange::single(PagePosition {
                index: idx,
                part: vp.part.as_u8(),
            }),
        };

        let is_last_index = idx == len as i64 - 1;
        let first_is_landscape = rh > 0 && rw as f64 / rh as f64 > 1.0;
        let force_single = self.config.frame_page_size == 1
            || (self.config.support_wide_page && first_is_landscape)
            || (self.config.single_first_page && idx == 0)
            || (self.config.single_last_page && is_last_index);

        let mut frame = if force_single {
            self.finish_single(first, direction)
        } else {
            self.try_build_wide(first, direction, list, len)
        };
        frame.terminal = self.terminal_for(frame.range, list);

        let frame = Arc::new(frame);
        self.cache.put(key, frame.clone());
        Some(frame)
    }

    fn try_build_wide(
        &self,
        first: FrameElement,
        direction: i8,
        list: &VirtualPageList,
        len: usize,
    ) -> PageFrame {
        let neighbor_idx = first.virtual_index as i64 + direction as i64;
        let neighbor_in_range = neighbor_idx >= 0 && (neighbor_idx as usize) < len;

        if !neighbor_in_range {
            return if self.config.insert_dummy_page {
                let dummy = FrameElement {
                    dummy: true,
                    ..first.clone()
                };
                self.finish_wide(first, dummy, direction)
            } else {
                self.finish_single(first, direction)
            };
        }

        let ni = neighbor_idx as usize;
        let Some(nvp) = list.get(ni) else {
            return self.finish_single(first, direction);
        };
        let Some(nphys) = list.physical_of(ni) else {
            return self.finish_single(first, direction);
        };
        let (nw, nh) = nvp.raw_size(nphys.width, nphys.height);
        let neighbor_is_landscape = nh > 0 && nw as f64 / nh as f64 > 1.0;
        let neighbor_hits_single_rule = (self.config.single_first_page && ni == 0)
            || (self.config.single_last_page && ni == len - 1);

        if neighbor_is_landscape || neighbor_hits_single_rule {
            return self.finish_single(first, direction);
        }

        let second = FrameElement {
            virtual_index: ni,
            physical_index: nvp.physical_index,
            part: nvp.part,
            crop: nvp.crop,
            raw_width: nw as f64,
            raw_height: nh as f64,
            scale: 1.0,
            offset_x: 0.0,
            dummy: false,
            range: PageRange::single(PagePosition {
                index: neighbor_idx,
                part: nvp.part.as_u8(),
            }),
        };
        self.finish_wide(first, second, direction)
    }

    fn finish_single(&self, first: FrameElement, direction: i8) -> PageFrame {
        let range = first.range;
        let composed_size = (first.raw_width, first.raw_height);
        let mut elements = vec![first];
        elements[0].offset_x = 0.0;
        PageFrame {
            terminal: Terminal::None, // computed by the caller, which has `list`
            range,
            direction,
            composed_size,
            elements,
        }
    }

    fn finish_wide(&self, first: FrameElement, second: FrameElement, direction: i8) -> PageFrame {
        let target_height = first.raw_height.max(second.raw_height);
        let scale_of = |h: f64| if h > 0.0 { target_height / h } else { 1.0 };

        let mut first = first;
        let mut second = second;
        first.scale = scale_of(first.raw_height);
        second.scale = scale_of(second.raw_height);

        let range = span_ranges(first.range, second.range);

        let mut ordered = vec![first, second];
        ordered.sort_by_key(|e| e.virtual_index);
        if self.config.reading_order == ReadingOrder::Rtl {
            ordered.reverse();
        }

        let mut x = 0.0;
        for el in ordered.iter_mut() {
            el.offset_x = x;
            x += el.raw_width * el.scale;
        }

        let composed_size = (x, target_height);
        PageFrame {
            terminal: Terminal::None, // overwritten by caller via terminal_for
            range,
            direction,
            composed_size,
            elements: ordered,
        }
    }

    fn terminal_for(&self, range: PageRange, list: &VirtualPageList) -> Terminal {
        if self.config.is_loop {
            return Terminal::None;
        }
        let first_pos = list.first().map(|vi| PagePosition { index: vi as i64, part: 0 });
        let last_pos = list.last().map(|vi| {
            let part = list.get(vi).map(|vp| vp.part.as_u8()).unwrap_or(0);
            PagePosition { index: vi as i64, part }
        });
        let is_first = first_pos.map(|p| range.contains(p)).unwrap_or(false);
        let is_last = last_pos.map(|p| range.contains(p)).unwrap_or(false);
        Terminal::combine(is_first, is_last)
    }

    /// Build the frame adjacent to `current` in `direction`, continuing
    /// from `current`'s covered range.
    ///
    /// Each half of a divided page already gets its own dense virtual
    /// index from the virtual page list (a split page never shares one
    /// index across two parts), so advancing always means stepping the
    /// edge virtual index by one; `build`'s normalization step recovers
    /// the destination's correct part from the virtual page itself.
    pub fn next_frame(
        &mut self,
        list: &VirtualPageList,
        current: &PageFrame,
        direction: i8,
    ) -> Option<Arc<PageFrame>> {
        let next_pos = advance_edge(current.range, direction);
        self.build(list, next_pos, direction)
    }

    /// Up to `count` frames starting at `start`, stopping early at the
    /// book's edge.
    pub fn frame_sequence(
        &mut self,
        list: &VirtualPageList,
        start: PagePosition,
        direction: i8,
        count: usize,
    ) -> Vec<Arc<PageFrame>> {
        let mut out = Vec::with_capacity(count);
        let Some(mut frame) = self.build(list, start, direction) else {
            return out;
        };
        out.push(frame.clone());
        for _ in 1..count {
            match self.next_frame(list, &frame, direction) {
                Some(f) => {
                    frame = f;
                    out.push(frame.clone());
                }
                None => break,
            }
        }
        out
    }
}

/// The union of two single-position ranges — a wide frame's range must
/// cover both elements regardless of which was probed first.
fn span_ranges(a: PageRange, b: PageRange) -> PageRange {
    let candidates = [a.min, a.max, b.min, b.max];
    let min = *candidates.iter().min_by_key(|p| p.order_key()).unwrap();
    let max = *candidates.iter().max_by_key(|p| p.order_key()).unwrap();
    PageRange { min, max }
}

/// The position one whole virtual index past (`direction >= 0`) or
/// before (`direction < 0`) the edge of `range`.
fn advance_edge(range: PageRange, direction: i8) -> PagePosition {
    let edge = if direction >= 0 { range.max } else { range.min };
    if direction >= 0 {
        PagePosition { index: edge.index + 1, part: 0 }
    } else {
        PagePosition { index: edge.index - 1, part: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PageMode, VirtualListConfigPatch};
    use crate::model::{PageKind, PageLocator, PhysicalPage};

    fn page(index: usize, w: u32, h: u32) -> PhysicalPage {
        PhysicalPage {
            index,
            name: format!("p{index}"),
            locator: PageLocator::ArchiveEntry(format!("p{index}")),
            width: w,
            height: h,
            modified: None,
            file_size: 0,
            kind: PageKind::Image,
            tombstone: false,
        }
    }

    fn start_pos() -> PagePosition {
        PagePosition { index: 0, part: 0 }
    }

    #[test]
    fn test_scenario_2_wide_with_wide_page_exception() {
        let mut list = VirtualPageList::new();
        list.set_config(VirtualListConfigPatch {
            page_mode: Some(PageMode::Wide),
            ..Default::default()
        });
        list.set_physical(vec![
            page(0, 100, 100),
            page(1, 100, 100),
            page(2, 200, 100), // landscape
            page(3, 100, 100),
            page(4, 100, 100),
        ]);

        let mut builder = PageFrameBuilder::new(FrameConfig {
            frame_page_size: 2,
            support_wide_page: true,
            ..Default::default()
        });

        let frames = builder.frame_sequence(&list, start_pos(), 1, 10);
        let sets: Vec<Vec<usize>> = frames
            .iter()
            .map(|f| f.elements.iter().map(|e| e.virtual_index).collect())
            .collect();
        assert_eq!(sets, vec![vec![0, 1], vec![2], vec![3, 4]]);
    }

    #[test]
    fn test_single_frame_size_one() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        let frame = builder.build(&list, start_pos(), 1).unwrap();
        assert_eq!(frame.elements.len(), 1);
    }

    #[test]
    fn test_wide_elements_share_rendered_height() {
        let mut list = VirtualPageList::new();
        list.set_config(VirtualListConfigPatch {
            page_mode: Some(PageMode::Wide),
            ..Default::default()
        });
        list.set_physical(vec![page(0, 100, 200), page(1, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig {
            frame_page_size: 2,
            ..Default::default()
        });
        let frame = builder.build(&list, start_pos(), 1).unwrap();
        assert_eq!(frame.elements.len(), 2);
        let heights: Vec<f64> = frame.elements.iter().map(|e| e.rendered_size().1).collect();
        assert!((heights[0] - heights[1]).abs() < 1e-9);
    }

    #[test]
    fn test_rtl_reverses_element_order() {
        let mut list = VirtualPageList::new();
        list.set_config(VirtualListConfigPatch {
            page_mode: Some(PageMode::Wide),
            reading_order: Some(ReadingOrder::Rtl),
            ..Default::default()
        });
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig {
            frame_page_size: 2,
            reading_order: ReadingOrder::Rtl,
            ..Default::default()
        });
        let frame = builder.build(&list, start_pos(), 1).unwrap();
        let indices: Vec<usize> = frame.elements.iter().map(|e| e.virtual_index).collect();
        assert_eq!(indices, vec![1, 0]);
    }

    #[test]
    fn test_insert_dummy_page_pads_trailing_odd_page() {
        let mut list = VirtualPageList::new();
        list.set_config(VirtualListConfigPatch {
            page_mode: Some(PageMode::Wide),
            ..Default::default()
        });
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100), page(2, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig {
            frame_page_size: 2,
            insert_dummy_page: true,
            ..Default::default()
        });
        let frames = builder.frame_sequence(&list, start_pos(), 1, 10);
        let last = frames.last().unwrap();
        assert_eq!(last.elements.len(), 2);
        assert!(last.elements[1].dummy);
        assert_eq!(last.elements[1].virtual_index, last.elements[0].virtual_index);
    }

    #[test]
    fn test_terminal_bits_first_and_last() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100), page(2, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        let first = builder.build(&list, start_pos(), 1).unwrap();
        assert_eq!(first.terminal, Terminal::First);

        let last = builder
            .build(&list, PagePosition { index: 2, part: 0 }, 1)
            .unwrap();
        assert_eq!(last.terminal, Terminal::Last);
    }

    #[test]
    fn test_single_page_book_loop_mode_has_no_terminal() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig {
            is_loop: true,
            ..Default::default()
        });
        let frame = builder.build(&list, start_pos(), 1).unwrap();
        assert_eq!(frame.terminal, Terminal::None);
    }

    #[test]
    fn test_out_of_range_without_loop_returns_none() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        assert!(builder
            .build(&list, PagePosition { index: 5, part: 0 }, 1)
            .is_none());
    }

    #[test]
    fn test_cache_hit_returns_same_arc() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        let a = builder.build(&list, start_pos(), 1).unwrap();
        let b = builder.build(&list, start_pos(), 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_single_size_sequence_over_divided_pages_visits_each_index_once() {
        let mut list = VirtualPageList::new();
        list.set_config(VirtualListConfigPatch {
            split_landscape: Some(true),
            split_threshold: Some(1.0),
            ..Default::default()
        });
        list.set_physical(vec![page(0, 100, 100), page(1, 200, 100), page(2, 100, 100)]);
        assert_eq!(list.length(), 4);

        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        let frames = builder.frame_sequence(&list, start_pos(), 1, 10);
        let visited: Vec<usize> = frames
            .iter()
            .flat_map(|f| f.elements.iter().map(|e| e.virtual_index))
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_config_change_invalidates_cache() {
        let mut list = VirtualPageList::new();
        list.set_physical(vec![page(0, 100, 100), page(1, 100, 100)]);
        let mut builder = PageFrameBuilder::new(FrameConfig::default());
        let a = builder.build(&list, start_pos(), 1).unwrap();
        builder.set_config(FrameConfig {
            frame_page_size: 2,
            ..Default::default()
        });
        let b = builder.build(&list, start_pos(), 1).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.elements.len(), 2);
    }
}
