//! # Relocatable Arena Allocator
//!
//! One contiguous region of 8-byte blocks, carved into power-of-two cells.
//! Callers never see an address: every allocation returns a [`MemPtr`] that
//! is resolved through the slot table on each access. Because nothing outside
//! the arena points into it, the whole region can be copied, moved or
//! written to disk and every handle stays valid against the copy.
//!
//! ```text
//!  slots:  [ s0 ][ s1 ][ s2 ] ...        MemPtr { arena, slot, generation }
//!             │     │     └──────────────┐
//!  blocks: [ cell ][  cell  ][ free ][ cell ... ]  <- bump top
//!                               ▲
//!                   free_lists[class]
//! ```
//!
//! ## Rules
//!
//! - Cells are zeroed on allocation, whether bumped or recycled.
//! - `free` pushes the cell onto its size-class list; nothing is compacted.
//! - A resolved borrow lives only as long as the allocator is not mutated.
//! - Freed or foreign handles are programming errors: `debug_assert!` in
//!   debug builds, ignored (with a warning) by `free` in release builds.
//!
//! Not thread-safe. The simulation thread owns the allocator.

use std::fmt;
use std::mem::{align_of, size_of};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::handle::{next_generation, MemPtr};
use crate::config::ArenaConfig;
use crate::error::{AllocError, CoreResult, SnapshotError};

/// Granularity of the arena in bytes.
pub const BLOCK_BYTES: usize = 8;

/// Largest alignment a cell can satisfy.
pub const MAX_CELL_ALIGN: usize = 8;

/// Number of power-of-two size classes (8 B up to 64 MiB).
pub const SIZE_CLASSES: usize = 24;

/// Largest single cell in bytes.
pub const MAX_CELL_BYTES: usize = BLOCK_BYTES << (SIZE_CLASSES - 1);

/// Minimum number of blocks added when the arena grows.
const MIN_GROW_BLOCKS: usize = 512;

/// Arena ids start at 1; 0 is the null handle's arena.
static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

fn fresh_arena_id() -> u32 {
    NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed)
}

/// Size class for a request of `len` bytes.
fn size_class(len: usize) -> CoreResult<usize> {
    if len > MAX_CELL_BYTES {
        return Err(AllocError::TooLarge {
            requested: len,
            max: MAX_CELL_BYTES,
        });
    }
    let blocks = len.div_ceil(BLOCK_BYTES).max(1);
    Ok(blocks.next_power_of_two().trailing_zeros() as usize)
}

/// One row of the handle lookup table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub(crate) struct SlotEntry {
    /// Cell start, in blocks.
    offset: u32,
    /// Requested length in bytes.
    len: u32,
    generation: u32,
    class: u8,
    live: u8,
    reserved: u16,
}

impl SlotEntry {
    #[inline]
    const fn is_live(self) -> bool {
        self.live != 0
    }

    #[inline]
    fn byte_range(self) -> Range<usize> {
        let start = self.offset as usize * BLOCK_BYTES;
        start..start + self.len as usize
    }

    #[inline]
    const fn cell_blocks(self) -> usize {
        1 << self.class
    }
}

/// Counters for diagnostics and benchmarks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Successful allocations since creation.
    pub allocations: u64,
    /// Frees since creation.
    pub frees: u64,
    /// Times the backing region was enlarged.
    pub grow_count: u32,
    /// Highest simultaneous live cell count.
    pub peak_live: usize,
}

/// Summary returned by [`Allocator::dispose`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisposeReport {
    /// Arena that was released.
    pub arena_id: u32,
    /// Cells still live at teardown (released in bulk).
    pub live_cells: usize,
    /// Committed bytes returned to the system.
    pub bytes_released: usize,
}

/// Relocatable arena allocator.
///
/// Cloning copies the arena bytes verbatim: the clone keeps the same arena id
/// and every handle issued so far resolves against it. This is how a world
/// is relocated or snapshotted.
#[derive(Clone)]
pub struct Allocator {
    id: u32,
    blocks: Vec<u64>,
    /// Bump pointer, in blocks.
    top: usize,
    max_blocks: usize,
    slots: Vec<SlotEntry>,
    free_slots: Vec<u32>,
    free_lists: [Vec<u32>; SIZE_CLASSES],
    live: usize,
    stats: AllocatorStats,
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("id", &self.id)
            .field("used_bytes", &self.used_bytes())
            .field("capacity_bytes", &self.capacity_bytes())
            .field("live", &self.live)
            .field("free_cells", &self.free_cell_count())
            .finish_non_exhaustive()
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(&ArenaConfig::default())
    }
}

impl Allocator {
    /// Creates an empty arena with the configured initial capacity.
    #[must_use]
    pub fn new(config: &ArenaConfig) -> Self {
        let max_blocks = (config.max_bytes / BLOCK_BYTES).min(u32::MAX as usize);
        let initial = config.initial_bytes.div_ceil(BLOCK_BYTES).min(max_blocks);
        Self {
            id: fresh_arena_id(),
            blocks: vec![0; initial],
            top: 0,
            max_blocks,
            slots: Vec::new(),
            free_slots: Vec::new(),
            free_lists: std::array::from_fn(|_| Vec::new()),
            live: 0,
            stats: AllocatorStats::default(),
        }
    }

    /// Creates an arena with `initial_bytes` committed and the default limit.
    #[must_use]
    pub fn with_capacity(initial_bytes: usize) -> Self {
        let defaults = ArenaConfig::default();
        Self::new(&ArenaConfig {
            initial_bytes: initial_bytes.min(defaults.max_bytes),
            max_bytes: defaults.max_bytes,
        })
    }

    /// Process-unique id stamped into every handle.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Committed bytes.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.blocks.len() * BLOCK_BYTES
    }

    /// Bytes below the bump pointer (live and free-listed cells).
    #[inline]
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.top * BLOCK_BYTES
    }

    /// Hard growth limit.
    #[inline]
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_blocks * BLOCK_BYTES
    }

    /// Number of live cells.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live
    }

    /// Number of cells parked on the size-class free lists.
    #[must_use]
    pub fn free_cell_count(&self) -> usize {
        self.free_lists.iter().map(Vec::len).sum()
    }

    /// Allocation counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> AllocatorStats {
        self.stats
    }

    /// Allocates a zeroed cell sized for `T`.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot grow to fit the cell.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs more than [`MAX_CELL_ALIGN`] alignment.
    #[inline]
    pub fn alloc<T: Pod>(&mut self) -> CoreResult<MemPtr> {
        assert_cell_layout::<T>();
        self.alloc_bytes(size_of::<T>())
    }

    /// Allocates a cell and writes `value` into it.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot grow to fit the cell.
    pub fn alloc_value<T: Pod>(&mut self, value: T) -> CoreResult<MemPtr> {
        let ptr = self.alloc::<T>()?;
        *self.get_mut::<T>(ptr) = value;
        Ok(ptr)
    }

    /// Allocates a zeroed cell of at least `len` bytes.
    ///
    /// Recycles a cell from the matching free list when one is available,
    /// otherwise bumps, growing the arena by doubling.
    ///
    /// # Errors
    ///
    /// [`AllocError::TooLarge`] if `len` exceeds [`MAX_CELL_BYTES`],
    /// [`AllocError::OutOfMemory`] if the arena limit is reached.
    pub fn alloc_bytes(&mut self, len: usize) -> CoreResult<MemPtr> {
        let class = size_class(len)?;
        let cell_blocks = 1usize << class;

        let offset = if let Some(offset) = self.free_lists[class].pop() {
            let start = offset as usize;
            self.blocks[start..start + cell_blocks].fill(0);
            offset
        } else {
            self.bump(cell_blocks)?
        };

        let slot = if let Some(slot) = self.free_slots.pop() {
            slot
        } else {
            let Ok(slot) = u32::try_from(self.slots.len()) else {
                self.free_lists[class].push(offset);
                return Err(AllocError::IndexOverflow(self.slots.len()));
            };
            self.slots.push(SlotEntry::zeroed());
            slot
        };

        let entry = &mut self.slots[slot as usize];
        if entry.generation == 0 {
            entry.generation = 1;
        }
        entry.offset = offset;
        // size_class bounds len by MAX_CELL_BYTES and class by SIZE_CLASSES.
        entry.len = u32::try_from(len).unwrap_or(u32::MAX);
        entry.class = u8::try_from(class).unwrap_or(u8::MAX);
        entry.live = 1;
        let ptr = MemPtr::new(self.id, slot, entry.generation);

        self.live += 1;
        self.stats.allocations += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live);
        Ok(ptr)
    }

    fn bump(&mut self, cell_blocks: usize) -> CoreResult<u32> {
        let end = self.top + cell_blocks;
        if end > self.max_blocks {
            return Err(AllocError::OutOfMemory {
                requested: cell_blocks * BLOCK_BYTES,
                used: self.used_bytes(),
                max: self.max_bytes(),
            });
        }
        if end > self.blocks.len() {
            self.grow(end);
        }
        // top <= max_blocks <= u32::MAX
        #[allow(clippy::cast_possible_truncation)]
        let offset = self.top as u32;
        self.top = end;
        Ok(offset)
    }

    fn grow(&mut self, required_blocks: usize) {
        let doubled = self.blocks.len().saturating_mul(2).max(MIN_GROW_BLOCKS);
        let target = doubled.max(required_blocks).min(self.max_blocks);
        tracing::debug!(
            arena = self.id,
            from_bytes = self.capacity_bytes(),
            to_bytes = target * BLOCK_BYTES,
            "arena grow"
        );
        self.blocks.resize(target, 0);
        self.stats.grow_count += 1;
    }

    /// Returns a cell to its size-class free list.
    ///
    /// Freeing [`MemPtr::NULL`] is a no-op. Freeing a stale or foreign handle
    /// asserts in debug builds; release builds ignore it and log a warning.
    pub fn free(&mut self, ptr: MemPtr) {
        if ptr.is_null() {
            return;
        }
        let live = self.is_live(ptr);
        debug_assert!(
            live,
            "free of stale or foreign handle {ptr:?} on arena {}",
            self.id
        );
        if !live {
            tracing::warn!(arena = self.id, ?ptr, "ignored free of invalid handle");
            return;
        }

        let entry = &mut self.slots[ptr.slot() as usize];
        entry.live = 0;
        entry.generation = next_generation(entry.generation);
        let class = entry.class as usize;
        let offset = entry.offset;

        self.free_lists[class].push(offset);
        self.free_slots.push(ptr.slot());
        self.live -= 1;
        self.stats.frees += 1;
    }

    /// True if `ptr` was issued by this arena and has not been freed.
    #[inline]
    #[must_use]
    pub fn is_live(&self, ptr: MemPtr) -> bool {
        self.entry(ptr).is_some()
    }

    #[inline]
    fn entry(&self, ptr: MemPtr) -> Option<SlotEntry> {
        if ptr.is_null() || ptr.arena_id() != self.id {
            return None;
        }
        let entry = *self.slots.get(ptr.slot() as usize)?;
        (entry.is_live() && entry.generation == ptr.generation()).then_some(entry)
    }

    #[inline]
    fn resolve(&self, ptr: MemPtr) -> SlotEntry {
        match self.entry(ptr) {
            Some(entry) => entry,
            None => panic!("invalid handle {ptr:?} for arena {}", self.id),
        }
    }

    /// Requested length of the cell behind `ptr`.
    ///
    /// # Panics
    ///
    /// Panics on a stale, null or foreign handle.
    #[must_use]
    pub fn cell_len(&self, ptr: MemPtr) -> usize {
        self.resolve(ptr).len as usize
    }

    /// Raw bytes of a cell.
    ///
    /// # Panics
    ///
    /// Panics on a stale, null or foreign handle.
    #[must_use]
    pub fn bytes(&self, ptr: MemPtr) -> &[u8] {
        let range = self.resolve(ptr).byte_range();
        &bytemuck::cast_slice::<u64, u8>(&self.blocks)[range]
    }

    /// Raw bytes of a cell, or `None` for an invalid handle.
    #[must_use]
    pub fn try_bytes(&self, ptr: MemPtr) -> Option<&[u8]> {
        let range = self.entry(ptr)?.byte_range();
        Some(&bytemuck::cast_slice::<u64, u8>(&self.blocks)[range])
    }

    /// Mutable raw bytes of a cell.
    ///
    /// # Panics
    ///
    /// Panics on a stale, null or foreign handle.
    pub fn bytes_mut(&mut self, ptr: MemPtr) -> &mut [u8] {
        let range = self.resolve(ptr).byte_range();
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.blocks)[range]
    }

    /// Borrows the cell as a `T`.
    ///
    /// # Panics
    ///
    /// Panics on an invalid handle or if the cell is smaller than `T`.
    #[must_use]
    pub fn get<T: Pod>(&self, ptr: MemPtr) -> &T {
        assert_cell_layout::<T>();
        let bytes = self.bytes(ptr);
        assert!(
            bytes.len() >= size_of::<T>(),
            "cell of {} bytes read as {}",
            bytes.len(),
            std::any::type_name::<T>()
        );
        bytemuck::from_bytes(&bytes[..size_of::<T>()])
    }

    /// Borrows the cell as a `T`, or `None` for an invalid or undersized cell.
    #[must_use]
    pub fn try_get<T: Pod>(&self, ptr: MemPtr) -> Option<&T> {
        assert_cell_layout::<T>();
        let bytes = self.try_bytes(ptr)?;
        bytes
            .get(..size_of::<T>())
            .map(|bytes| bytemuck::from_bytes(bytes))
    }

    /// Mutably borrows the cell as a `T`.
    ///
    /// # Panics
    ///
    /// Panics on an invalid handle or if the cell is smaller than `T`.
    pub fn get_mut<T: Pod>(&mut self, ptr: MemPtr) -> &mut T {
        assert_cell_layout::<T>();
        let bytes = self.bytes_mut(ptr);
        assert!(
            bytes.len() >= size_of::<T>(),
            "cell of {} bytes written as {}",
            bytes.len(),
            std::any::type_name::<T>()
        );
        bytemuck::from_bytes_mut(&mut bytes[..size_of::<T>()])
    }

    /// Views the first `count` elements of a cell as a slice.
    pub(crate) fn slice<T: Pod>(&self, ptr: MemPtr, count: usize) -> &[T] {
        assert_cell_layout::<T>();
        bytemuck::cast_slice(&self.bytes(ptr)[..count * size_of::<T>()])
    }

    /// Mutable counterpart of [`Allocator::slice`].
    pub(crate) fn slice_mut<T: Pod>(&mut self, ptr: MemPtr, count: usize) -> &mut [T] {
        assert_cell_layout::<T>();
        bytemuck::cast_slice_mut(&mut self.bytes_mut(ptr)[..count * size_of::<T>()])
    }

    /// Copies `len` bytes from the start of `src` to the start of `dst`.
    pub(crate) fn copy_bytes(&mut self, src: MemPtr, dst: MemPtr, len: usize) {
        let src = self.resolve(src).byte_range();
        let dst = self.resolve(dst).byte_range();
        assert!(len <= src.len() && len <= dst.len(), "copy exceeds cell bounds");
        bytemuck::cast_slice_mut::<u64, u8>(&mut self.blocks)
            .copy_within(src.start..src.start + len, dst.start);
    }

    /// Releases the whole arena. Every outstanding handle becomes invalid.
    pub fn dispose(self) -> DisposeReport {
        let report = DisposeReport {
            arena_id: self.id,
            live_cells: self.live,
            bytes_released: self.capacity_bytes(),
        };
        tracing::debug!(
            arena = report.arena_id,
            live_cells = report.live_cells,
            bytes = report.bytes_released,
            "arena disposed"
        );
        report
    }

    /// Captures the arena as a serialisable image.
    ///
    /// Only the bytes below the bump pointer are saved.
    #[must_use]
    pub fn to_image(&self) -> ArenaImage {
        ArenaImage {
            arena_id: self.id,
            blocks: self.blocks[..self.top].to_vec(),
            max_blocks: self.max_blocks,
            slots: self.slots.clone(),
            free_slots: self.free_slots.clone(),
            free_lists: self.free_lists.to_vec(),
        }
    }

    /// Rebuilds an arena from an image.
    ///
    /// The arena keeps the image's id so handles stored inside it stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::CorruptImage`] if the image is inconsistent.
    pub fn from_image(image: ArenaImage) -> Result<Self, SnapshotError> {
        image.validate()?;
        NEXT_ARENA_ID.fetch_max(image.arena_id.saturating_add(1), Ordering::Relaxed);

        let live = image.slots.iter().filter(|slot| slot.is_live()).count();
        let top = image.blocks.len();
        let mut free_lists: [Vec<u32>; SIZE_CLASSES] = std::array::from_fn(|_| Vec::new());
        for (list, saved) in free_lists.iter_mut().zip(image.free_lists) {
            *list = saved;
        }

        Ok(Self {
            id: image.arena_id,
            blocks: image.blocks,
            top,
            max_blocks: image.max_blocks,
            slots: image.slots,
            free_slots: image.free_slots,
            free_lists,
            live,
            stats: AllocatorStats {
                peak_live: live,
                ..AllocatorStats::default()
            },
        })
    }
}

#[inline]
fn assert_cell_layout<T>() {
    assert!(
        align_of::<T>() <= MAX_CELL_ALIGN,
        "{} needs {}-byte alignment; arena cells guarantee {}",
        std::any::type_name::<T>(),
        align_of::<T>(),
        MAX_CELL_ALIGN
    );
}

/// Serialisable copy of an arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaImage {
    arena_id: u32,
    blocks: Vec<u64>,
    max_blocks: usize,
    slots: Vec<SlotEntry>,
    free_slots: Vec<u32>,
    free_lists: Vec<Vec<u32>>,
}

impl ArenaImage {
    /// Id of the arena the image was taken from.
    #[must_use]
    pub const fn arena_id(&self) -> u32 {
        self.arena_id
    }

    /// The arena contents below the bump pointer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let corrupt = |reason: String| Err(SnapshotError::CorruptImage(reason));
        let top = self.blocks.len();

        if top > self.max_blocks {
            return corrupt(format!("{top} blocks exceed limit {}", self.max_blocks));
        }
        if self.free_lists.len() != SIZE_CLASSES {
            return corrupt(format!("{} free lists, expected {SIZE_CLASSES}", self.free_lists.len()));
        }
        for (index, slot) in self.slots.iter().enumerate() {
            if !slot.is_live() {
                continue;
            }
            if slot.class as usize >= SIZE_CLASSES
                || slot.offset as usize + slot.cell_blocks() > top
                || slot.len as usize > slot.cell_blocks() * BLOCK_BYTES
                || slot.generation == 0
            {
                return corrupt(format!("slot {index} out of bounds"));
            }
        }
        for &slot in &self.free_slots {
            match self.slots.get(slot as usize) {
                Some(entry) if !entry.is_live() => {}
                _ => return corrupt(format!("free slot {slot} is live or missing")),
            }
        }
        for (class, list) in self.free_lists.iter().enumerate() {
            if list.iter().any(|&offset| offset as usize + (1usize << class) > top) {
                return corrupt(format!("free list {class} points past the arena"));
            }
        }
        Ok(())
    }
}
