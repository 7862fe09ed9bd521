//! # Arena Handles
//!
//! A [`MemPtr`] names a cell inside exactly one [`Allocator`](super::Allocator).
//! It is plain bytes, so it can itself be stored inside arena memory and moves
//! with the arena without fix-up.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Opaque handle to an arena cell.
///
/// Layout: `{arena, slot, generation}`. The arena id rejects foreign use,
/// the generation rejects use after free. The all-zero value is the null
/// handle; live cells always carry a non-zero generation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct MemPtr {
    arena: u32,
    slot: u32,
    generation: u32,
}

impl MemPtr {
    /// The null handle. Freeing it is a no-op; resolving it panics.
    pub const NULL: Self = Self {
        arena: 0,
        slot: 0,
        generation: 0,
    };

    #[inline]
    pub(crate) const fn new(arena: u32, slot: u32, generation: u32) -> Self {
        Self {
            arena,
            slot,
            generation,
        }
    }

    /// Returns true for the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.generation == 0
    }

    /// Id of the arena that produced this handle.
    #[inline]
    #[must_use]
    pub const fn arena_id(self) -> u32 {
        self.arena
    }

    /// Slot index inside the arena's lookup table.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Generation of the slot when the handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Next generation for a recycled slot. Zero is reserved for null.
#[inline]
pub(crate) const fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_zeroed() {
        assert!(MemPtr::NULL.is_null());
        assert_eq!(MemPtr::zeroed(), MemPtr::NULL);
        assert_eq!(MemPtr::default(), MemPtr::NULL);
        assert!(!MemPtr::new(1, 0, 1).is_null());
    }

    #[test]
    fn test_generation_skips_zero() {
        assert_eq!(next_generation(0), 1);
        assert_eq!(next_generation(41), 42);
        assert_eq!(next_generation(u32::MAX), 1);
    }

    #[test]
    fn test_handle_size() {
        // Handles are embedded in components; keep them small.
        assert_eq!(std::mem::size_of::<MemPtr>(), 12);
    }
}
