//! # Memory Management
//!
//! The relocatable arena and the handle-based containers built on it.
//!
//! ## Design Philosophy
//!
//! Simulation state is stored as bytes in one arena:
//! - No native pointers into simulation state
//! - Handles are resolved through the arena on every access
//! - The arena can be cloned, imaged and restored without fix-up

mod allocator;
mod handle;
mod list;

pub use allocator::{
    Allocator, AllocatorStats, ArenaImage, DisposeReport, BLOCK_BYTES, MAX_CELL_ALIGN,
    MAX_CELL_BYTES, SIZE_CLASSES,
};
pub use handle::MemPtr;
pub(crate) use handle::next_generation;
pub use list::MemList;
