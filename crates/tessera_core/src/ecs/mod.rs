//! # Entity Component System
//!
//! Per-type component storage living entirely in the arena.
//!
//! ## Design Philosophy
//!
//! - Component values and their sets are plain bytes
//! - Entity IDs are indices with generation counters
//! - Cleanup of nested arena cells is explicit, through destroy handlers
//! - Dynamic dispatch only at table granularity, never per element

mod component;
mod component_set;
mod destroy;
mod entity;
pub(crate) mod table;

pub use component::{Component, StorageKind};
pub use component_set::{ComponentSet, ComponentSetElement};
pub use destroy::{DestroyContext, DestroyHandler};
pub use entity::{Entity, EntitySlot, EntityTable};
