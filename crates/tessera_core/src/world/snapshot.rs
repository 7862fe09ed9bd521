//! # World Snapshots
//!
//! A snapshot is the whole mutable state as plain data: the arena image,
//! the entity table, every component-set header, and the tick state. Tables
//! are keyed by stable type name so a snapshot can be restored against a
//! registry built in a different order (or by a later build).
//!
//! Destroy handlers are behaviour, not state, and are never captured.

use serde::{Deserialize, Serialize};

use super::tick::TickState;
use crate::ecs::EntityTable;
use crate::index::IndexRemap;
use crate::memory::ArenaImage;

/// Header bytes of one component table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableImage {
    /// Stable name of the component type.
    pub type_name: String,
    /// Raw bytes of the component set header.
    pub header: Vec<u8>,
    /// `size_of` the component when captured.
    pub value_size: usize,
    /// `align_of` the component when captured.
    pub value_align: usize,
}

/// Immutable copy of a [`WorldState`](super::WorldState).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub(crate) arena: ArenaImage,
    pub(crate) entities: EntityTable,
    pub(crate) tables: Vec<TableImage>,
    pub(crate) tick: TickState,
    pub(crate) remap: IndexRemap,
}

impl WorldSnapshot {
    /// The arena image.
    #[must_use]
    pub const fn arena(&self) -> &ArenaImage {
        &self.arena
    }

    /// Entity liveness at capture time.
    #[must_use]
    pub const fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Component table headers.
    #[must_use]
    pub fn tables(&self) -> &[TableImage] {
        &self.tables
    }

    /// Tick state at capture time.
    #[must_use]
    pub const fn tick_state(&self) -> &TickState {
        &self.tick
    }

    /// Tick counter at capture time.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick.tick()
    }

    /// Index names of the registry the snapshot was taken with. Use it to
    /// resolve [`DelegateCall`](crate::DelegateCall)s stored in components.
    #[must_use]
    pub const fn remap(&self) -> &IndexRemap {
        &self.remap
    }
}
