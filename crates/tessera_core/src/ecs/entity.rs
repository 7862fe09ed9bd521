//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the slot table (and into dense component storage)
//! - A generation counter for detecting stale references after reuse

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::memory::next_generation;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: slot index
/// - Upper 32 bits: generation counter
///
/// Live entities never have generation 0, so a zeroed `Entity` (as found in
/// freshly grown arena storage) never matches a live one.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates an entity from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// True for [`Entity::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// True if this value could name a live entity (not null, not zeroed).
    #[inline]
    #[must_use]
    pub const fn is_occupied(self) -> bool {
        !self.is_null() && self.generation() != 0
    }

    /// Raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds an entity from [`Entity::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

/// One row of the entity table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct EntitySlot {
    /// Generation of the current (or last) occupant.
    pub generation: u32,
    /// Non-zero while the slot is alive.
    pub alive: u32,
}

/// Allocates entity ids and tracks liveness.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTable {
    slots: Vec<EntitySlot>,
    free_indices: Vec<u32>,
    alive_count: usize,
}

impl EntityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::new(),
            alive_count: 0,
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of slots ever handed out (live or recycled).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Spawns an entity, reusing a freed slot when possible.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots are needed.
    pub fn spawn(&mut self) -> Entity {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                assert!(index < u32::MAX, "entity index space exhausted");
                self.slots.push(EntitySlot::default());
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        // Increment generation to invalidate old references
        slot.generation = next_generation(slot.generation);
        slot.alive = 1;
        self.alive_count += 1;

        Entity::new(index, slot.generation)
    }

    /// Frees an entity's slot.
    ///
    /// Returns `false` if the entity was already dead or the id is stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.slots[entity.index() as usize].alive = 0;
        self.free_indices.push(entity.index());
        self.alive_count -= 1;
        true
    }

    /// True if `entity` names the current occupant of a live slot.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive != 0 && slot.generation == entity.generation())
    }

    /// Iterates over all live entities in index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            (slot.alive != 0).then(|| Entity::new(index, slot.generation))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = Entity::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert_eq!(Entity::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_null_and_zeroed() {
        assert!(Entity::NULL.is_null());
        assert!(!Entity::NULL.is_occupied());
        assert!(!Entity::zeroed().is_occupied());
        assert_eq!(Entity::default(), Entity::NULL);
    }

    #[test]
    fn test_spawn_despawn() {
        let mut table = EntityTable::new();

        let e1 = table.spawn();
        let e2 = table.spawn();
        assert!(table.is_alive(e1));
        assert_eq!(e1.generation(), 1);
        assert_eq!(table.alive_count(), 2);

        assert!(table.despawn(e1));
        assert!(!table.despawn(e1), "second despawn is a no-op");
        assert!(!table.is_alive(e1));
        assert!(table.is_alive(e2));

        // Spawn again - should reuse the slot
        let e3 = table.spawn();
        assert_eq!(e3.index(), e1.index());
        assert_ne!(e3.generation(), e1.generation());
        assert!(!table.is_alive(e1), "stale id stays dead");
    }

    #[test]
    fn test_iter_alive() {
        let mut table = EntityTable::new();
        let a = table.spawn();
        let b = table.spawn();
        let c = table.spawn();
        table.despawn(b);
        assert_eq!(table.iter_alive().collect::<Vec<_>>(), vec![a, c]);
    }
}
