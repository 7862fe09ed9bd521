//! # TESSERA Core
//!
//! Relocatable simulation state:
//! - One arena holds every mutable byte of the simulation
//! - Handles instead of pointers, resolved through the arena
//! - State stores dense integer indices, never `TypeId`s or trait objects;
//!   typed calls resolve their index once through the [`Indexer`]
//!
//! ## Architecture Rules
//!
//! 1. **No native pointers into state** - components hold [`MemPtr`] and
//!    [`MemList`], never `Box` or `Vec`
//! 2. **Explicit cleanup** - nested cells are released by destroy handlers,
//!    exactly once
//! 3. **Copyable as bytes** - the arena can be cloned, imaged and restored
//!    without fix-up
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{IndexerBuilder, WorldConfig, WorldState};
//!
//! let indexer = IndexerBuilder::new().with_component::<Cargo>().build();
//! let mut world = WorldState::new(Arc::new(indexer), &WorldConfig::default());
//!
//! let ship = world.spawn();
//! world.insert(ship, Cargo::default())?;
//! world.destroy(ship); // Cargo's handler frees its lists
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod index;
pub mod memory;
pub mod sync;
pub mod value;
pub mod world;

pub use config::{ArenaConfig, OverResumePolicy, TickConfig, WorldConfig};
pub use ecs::{
    Component, ComponentSet, ComponentSetElement, DestroyContext, DestroyHandler, Entity,
    EntityTable, StorageKind,
};
pub use error::{AllocError, ConfigError, CoreResult, SnapshotError};
pub use index::{
    DelegateCall, DelegateIndex, IndexRemap, Indexer, IndexerBuilder, Invoker, Proxy, TypeIndex,
};
pub use memory::{Allocator, AllocatorStats, ArenaImage, DisposeReport, MemList, MemPtr};
pub use sync::SnapshotExchange;
pub use value::{OneShotValue, OptionalValue};
pub use world::{TickState, WorldSnapshot, WorldState};
