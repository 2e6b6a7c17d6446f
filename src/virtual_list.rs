//! Virtual Page List: turns an ordered `Vec<PhysicalPage>` into an ordered
//! `Vec<VirtualPage>` under a `VirtualListConfig`, with bidirectional
//! physical↔virtual index maps.

use std::collections::HashMap;

use crate::config::{PageMode, ReadingOrder, VirtualListConfig, VirtualListConfigPatch};
use crate::model::{CropRect, Part, PhysicalPage, VirtualPage};

/// How pages are ordered before splitting into virtual pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortMode {
    /// Original entry order.
    Entry,
    /// Reverse of original entry order.
    EntryDesc,
    /// Natural (numeric-aware) name order.
    Name,
    /// Reverse natural name order.
    NameDesc,
    /// Modification time, oldest first.
    Time,
    /// Modification time, newest first.
    TimeDesc,
    /// File size, smallest first.
    Size,
    /// File size, largest first.
    SizeDesc,
    /// Deterministic pseudo-random permutation, seeded.
    Random,
}

/// A tiny, dependency-free Mulberry32 PRNG — enough to drive a seeded,
/// reproducible Fisher-Yates shuffle.
#[derive(Clone, Debug)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Seed the generator.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next pseudo-random `u32`.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut z = self.state;
        z = (z ^ (z >> 15)).wrapping_mul(z | 1);
        z ^= z.wrapping_add((z ^ (z >> 7)).wrapping_mul(z | 61));
        z ^ (z >> 14)
    }

    /// Next value in `[0, bound)`.
    pub fn next_below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            0
        } else {
            (self.next_u32() as usize) % bound
        }
    }
}

/// Fisher-Yates shuffle of `items`, driven by `rng`.
fn shuffle<T>(items: &mut [T], rng: &mut Mulberry32) {
    for i in (1..items.len()).rev() {
        let j = rng.next_below(i + 1);
        items.swap(i, j);
    }
}

/// Numeric-aware ("natural") string comparison: runs of ASCII digits
/// compare as integers, everything else compares byte-for-byte.
pub fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let (mut ai, mut bi) = (a.as_bytes().iter().peekable(), b.as_bytes().iter().peekable());
    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&&ca), Some(&&cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let mut na: u64 = 0;
                    while let Some(&&c) = ai.peek() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        na = na * 10 + (c - b'0') as u64;
                        ai.next();
                    }
                    let mut nb: u64 = 0;
                    while let Some(&&c) = bi.peek() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        nb = nb * 10 + (c - b'0') as u64;
                        bi.next();
                    }
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                } else if ca != cb {
                    return ca.cmp(&cb);
                } else {
                    ai.next();
                    bi.next();
                }
            }
        }
    }
}

/// Outcome of a mutator that may trigger a rebuild, returned directly to
/// the caller instead of routed through an event; the owning
/// `BookCoordinator` checks it to decide whether to re-navigate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The virtual sequence was recomputed.
    Rebuilt,
    /// Nothing changed; no rebuild was necessary.
    Unchanged,
}

impl RebuildOutcome {
    /// `true` for `Rebuilt`.
    pub fn did_rebuild(self) -> bool {
        matches!(self, RebuildOutcome::Rebuilt)
    }

    fn from_bool(b: bool) -> Self {
        if b {
            RebuildOutcome::Rebuilt
        } else {
            RebuildOutcome::Unchanged
        }
    }
}

/// Ordered, sortable, filterable, splittable sequence of virtual pages.
pub struct VirtualPageList {
    physical: Vec<PhysicalPage>,
    virtuals: Vec<VirtualPage>,
    phys_to_virt: HashMap<usize, Vec<usize>>,
    config: VirtualListConfig,
    sort_mode: SortMode,
    sort_seed: u32,
    search_keyword: String,
    generation: u64,
}

impl Default for VirtualPageList {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualPageList {
    /// An empty list with default configuration.
    pub fn new() -> Self {
        let mut list = Self {
            physical: Vec::new(),
            virtuals: Vec::new(),
            phys_to_virt: HashMap::new(),
            config: VirtualListConfig::default(),
            sort_mode: SortMode::Entry,
            sort_seed: 0,
            search_keyword: String::new(),
            generation: 0,
        };
        list.rebuild();
        list
    }

    /// Replace the physical vector; always rebuilds.
    pub fn set_physical(&mut self, pages: Vec<PhysicalPage>) -> RebuildOutcome {
        self.physical = pages;
        self.rebuild();
        RebuildOutcome::Rebuilt
    }

    /// Update one physical page's natural size, recomputing aspect ratio
    /// and landscape classification. Only rebuilds when the landscape
    /// classification crosses the split threshold and splitting is
    /// enabled.
    pub fn update_size(&mut self, physical_index: usize, width: u32, height: u32) -> RebuildOutcome {
        self.update_sizes(&[(physical_index, width, height)])
    }

    /// Batch form of `update_size`.
    pub fn update_sizes(&mut self, updates: &[(usize, u32, u32)]) -> RebuildOutcome {
        let mut crossed = false;
        for &(physical_index, width, height) in updates {
            let Some(page) = self.physical.get_mut(physical_index) else {
                continue;
            };
            let was_landscape = page.is_landscape();
            page.width = width;
            page.height = height;
            let is_landscape = page.is_landscape();
            if was_landscape != is_landscape {
                crossed = true;
            }
        }
        if crossed && self.config.split_landscape {
            self.rebuild();
            RebuildOutcome::Rebuilt
        } else {
            RebuildOutcome::Unchanged
        }
    }

    /// Change the sort mode. `Random` with `seed = None` reuses the
    /// previously stored seed rather than resampling, so that calling
    /// `set_sort_mode` twice with the same arguments is a no-op.
    pub fn set_sort_mode(&mut self, mode: SortMode, seed: Option<u32>) -> RebuildOutcome {
        let seed_changed = matches!((mode, seed), (SortMode::Random, Some(s)) if s != self.sort_seed);
        let mode_changed = mode != self.sort_mode;
        if let Some(s) = seed {
            self.sort_seed = s;
        }
        self.sort_mode = mode;
        if mode_changed || seed_changed {
            self.rebuild();
            RebuildOutcome::Rebuilt
        } else {
            RebuildOutcome::Unchanged
        }
    }

    /// Case-insensitive substring filter against entry name or locator.
    pub fn set_search(&mut self, keyword: &str) -> RebuildOutcome {
        if keyword == self.search_keyword {
            return RebuildOutcome::Unchanged;
        }
        self.search_keyword = keyword.to_string();
        self.rebuild();
        RebuildOutcome::Rebuilt
    }

    /// Apply a partial config patch; rebuilds only if a layout-affecting
    /// knob actually changed (see `VirtualListConfig::apply`).
    pub fn set_config(&mut self, patch: VirtualListConfigPatch) -> RebuildOutcome {
        let changed = self.config.apply(patch);
        RebuildOutcome::from_bool(if changed {
            self.rebuild();
            true
        } else {
            false
        })
    }

    /// The list's current configuration.
    pub fn config(&self) -> &VirtualListConfig {
        &self.config
    }

    /// Number of virtual pages.
    pub fn length(&self) -> usize {
        self.virtuals.len()
    }

    /// Virtual page at `vi`, or `None` if out of range.
    pub fn get(&self, vi: usize) -> Option<&VirtualPage> {
        self.virtuals.get(vi)
    }

    /// The physical page a virtual page projects, or `None`.
    pub fn physical_of(&self, vi: usize) -> Option<&PhysicalPage> {
        let vp = self.virtuals.get(vi)?;
        self.physical.get(vp.physical_index)
    }

    /// The physical index for a virtual index, or `None`.
    pub fn to_physical(&self, vi: usize) -> Option<usize> {
        self.virtuals.get(vi).map(|vp| vp.physical_index)
    }

    /// Every virtual index that projects from `pi`. Empty slice if `pi`
    /// produced no virtual pages (filtered out) or is out of range.
    pub fn to_virtuals(&self, pi: usize) -> &[usize] {
        self.phys_to_virt.get(&pi).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Virtual pages in `[start, end)`, clamped to the list's bounds.
    pub fn range(&self, start: usize, end: usize) -> &[VirtualPage] {
        let end = end.min(self.virtuals.len());
        let start = start.min(end);
        &self.virtuals[start..end]
    }

    /// Whether `vi` is a valid virtual index.
    pub fn is_valid(&self, vi: usize) -> bool {
        vi < self.virtuals.len()
    }

    /// Clamp `vi` into `[0, length-1]`; `0` when the list is empty.
    pub fn clamp(&self, vi: i64) -> usize {
        if self.virtuals.is_empty() {
            return 0;
        }
        vi.clamp(0, self.virtuals.len() as i64 - 1) as usize
    }

    /// First valid virtual index, if any.
    pub fn first(&self) -> Option<usize> {
        if self.virtuals.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Last valid virtual index, if any.
    pub fn last(&self) -> Option<usize> {
        self.virtuals.len().checked_sub(1)
    }

    /// The next virtual index whose physical page's folder differs from
    /// the folder at `vi`, or `None` if `vi` is in the last folder.
    pub fn next_folder_index(&self, vi: usize) -> Option<usize> {
        let current_folder = self.physical_of(vi)?.locator.folder().to_string();
        ((vi + 1)..self.virtuals.len())
            .find(|&i| self.physical_of(i).map(|p| p.locator.folder()) != Some(current_folder.as_str()))
    }

    /// The previous virtual index whose physical page's folder differs
    /// from the folder at `vi`, or `None` if `vi` is in the first folder.
    pub fn prev_folder_index(&self, vi: usize) -> Option<usize> {
        let current_folder = self.physical_of(vi)?.locator.folder().to_string();
        (0..vi)
            .rev()
            .find(|&i| self.physical_of(i).map(|p| p.locator.folder()) != Some(current_folder.as_str()))
    }

    /// Monotonically increasing counter bumped on every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn rebuild(&mut self) {
        // 1. filter by keyword
        let keyword = self.search_keyword.to_lowercase();
        let mut order: Vec<usize> = self
            .physical
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                keyword.is_empty()
                    || p.name.to_lowercase().contains(&keyword)
                    || p.locator.as_str().to_lowercase().contains(&keyword)
            })
            .map(|(i, _)| i)
            .collect();

        // 2. sort
        match self.sort_mode {
            SortMode::Entry => {}
            SortMode::EntryDesc => order.reverse(),
            SortMode::Name => order.sort_by(|&a, &b| natural_cmp(&self.physical[a].name, &self.physical[b].name)),
            SortMode::NameDesc => {
                order.sort_by(|&a, &b| natural_cmp(&self.physical[b].name, &self.physical[a].name))
            }
            SortMode::Time => order.sort_by_key(|&i| self.physical[i].modified),
            SortMode::TimeDesc => {
                order.sort_by_key(|&i| std::cmp::Reverse(self.physical[i].modified))
            }
            SortMode::Size => order.sort_by_key(|&i| self.physical[i].file_size),
            SortMode::SizeDesc => order.sort_by_key(|&i| std::cmp::Reverse(self.physical[i].file_size)),
            SortMode::Random => {
                let mut rng = Mulberry32::new(self.sort_seed);
                shuffle(&mut order, &mut rng);
            }
        }

        // 3. emit virtual pages
        self.virtuals.clear();
        self.phys_to_virt.clear();
        for &pi in &order {
            let page = &self.physical[pi];
            let split = self.config.page_mode == PageMode::Single
                && self.config.split_landscape
                && page.aspect_ratio() > self.config.split_threshold;
            let mut produced = Vec::with_capacity(2);
            if split {
                let half_w = page.width / 2;
                let (first_part, second_part) = match self.config.reading_order {
                    ReadingOrder::Rtl => (Part::Second, Part::First),
                    ReadingOrder::Ltr => (Part::First, Part::Second),
                };
                for part in [first_part, second_part] {
                    let x = match part {
                        Part::First => 0,
                        Part::Second => half_w,
                    };
                    let vi = self.virtuals.len();
                    self.virtuals.push(VirtualPage {
                        virtual_index: vi,
                        physical_index: pi,
                        part,
                        crop: Some(CropRect {
                            x,
                            y: 0,
                            width: half_w,
                            height: page.height,
                        }),
                        divided: true,
                    });
                    produced.push(vi);
                }
            } else {
                let vi = self.virtuals.len();
                self.virtuals.push(VirtualPage {
                    virtual_index: vi,
                    physical_index: pi,
                    part: Part::First,
                    crop: None,
                    divided: false,
                });
                produced.push(vi);
            }
            self.phys_to_virt.insert(pi, produced);
        }

        // 4. bump generation
        self.generation += 1;
    }
}
