//! # Component Sets
//!
//! Per-type storage mapping an entity to at most one component value. All
//! storage is arena-backed: the set header is three [`MemList`] handles and
//! two counters, so it is `Pod` and can be imaged with the arena.
//!
//! ```text
//! Sparse:  sparse[entity.index] = slot + 1 (0 = absent)
//!          entities[slot], values[slot]      <- packed, swap-remove
//!
//! Dense:   entities[entity.index], values[entity.index]
//!          vacant rows are zeroed
//! ```
//!
//! Every lookup compares the full entity id (index and generation), so stale
//! ids miss instead of aliasing a reused slot.

// SAFETY: Pod/Zeroable are implemented by hand for a generic repr(C) header.
#![allow(unsafe_code)]

use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::component::{Component, StorageKind};
use super::entity::Entity;
use crate::error::{AllocError, CoreResult};
use crate::memory::{Allocator, MemList};

/// A stored component together with the entity that owns it.
///
/// Destroy handlers receive these, either as a sparse batch
/// (`&[&ComponentSetElement<T>]`) or a dense batch
/// (`&[ComponentSetElement<T>]`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentSetElement<T> {
    /// Owning entity.
    pub entity: Entity,
    /// Component value as it was when removed.
    pub value: T,
}

/// Arena-backed storage for one component type.
#[repr(C)]
pub struct ComponentSet<T> {
    /// Sparse storage only: entity index to slot + 1.
    sparse: MemList<u32>,
    entities: MemList<Entity>,
    values: MemList<T>,
    count: u32,
    kind: u32,
}

// SAFETY: three 20-byte MemList headers (align 4) and two u32: 68 bytes,
// align 4, no padding. Every field is Pod when T is Pod.
unsafe impl<T: Pod> Zeroable for ComponentSet<T> {}
// SAFETY: see above.
unsafe impl<T: Pod> Pod for ComponentSet<T> {}

impl<T> Clone for ComponentSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentSet<T> {}

impl<T> fmt::Debug for ComponentSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSet")
            .field("kind", &StorageKind::from_u32(self.kind))
            .field("count", &self.count)
            .field("entities", &self.entities)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl<T: Component> Default for ComponentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot ids are stored off by one so zero means "absent".
#[inline]
fn slot_id(slot: usize) -> CoreResult<u32> {
    u32::try_from(slot + 1).map_err(|_| AllocError::IndexOverflow(slot))
}

impl<T: Component> ComponentSet<T> {
    /// An empty set using `T::STORAGE`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sparse: MemList::new(),
            entities: MemList::new(),
            values: MemList::new(),
            count: 0,
            kind: T::STORAGE as u32,
        }
    }

    /// Storage strategy of this set.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        StorageKind::from_u32(self.kind)
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    /// True if no component is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn slot_of(&self, allocator: &Allocator, entity: Entity) -> Option<usize> {
        if !entity.is_occupied() {
            return None;
        }
        let index = entity.index() as usize;
        let slot = match self.kind() {
            StorageKind::Sparse => (self.sparse.get(allocator, index)? as usize).checked_sub(1)?,
            StorageKind::Dense => index,
        };
        (self.entities.get(allocator, slot)? == entity).then_some(slot)
    }

    /// True if `entity` has a component in this set.
    #[must_use]
    pub fn contains(&self, allocator: &Allocator, entity: Entity) -> bool {
        self.slot_of(allocator, entity).is_some()
    }

    /// Borrows the component of `entity`.
    #[must_use]
    pub fn get<'a>(&self, allocator: &'a Allocator, entity: Entity) -> Option<&'a T> {
        let slot = self.slot_of(allocator, entity)?;
        self.values.as_slice(allocator).get(slot)
    }

    /// Mutably borrows the component of `entity`.
    pub fn get_mut<'a>(&self, allocator: &'a mut Allocator, entity: Entity) -> Option<&'a mut T> {
        let slot = self.slot_of(allocator, entity)?;
        self.values.as_mut_slice(allocator).get_mut(slot)
    }

    /// Copies the component out, lets `f` edit it with the allocator at
    /// hand, and writes it back. This is how nested lists inside a component
    /// are grown.
    pub fn update<R>(
        &self,
        allocator: &mut Allocator,
        entity: Entity,
        f: impl FnOnce(&mut Allocator, &mut T) -> R,
    ) -> Option<R> {
        let slot = self.slot_of(allocator, entity)?;
        let mut value = self.values.get(allocator, slot)?;
        let result = f(allocator, &mut value);
        self.values.set(allocator, slot, value);
        Some(result)
    }

    /// Stores `value` for `entity`, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot grow the backing lists; the set is left
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is null or zeroed.
    pub fn insert(
        &mut self,
        allocator: &mut Allocator,
        entity: Entity,
        value: T,
    ) -> CoreResult<Option<T>> {
        assert!(entity.is_occupied(), "cannot attach a component to {entity:?}");
        match self.kind() {
            StorageKind::Sparse => self.insert_sparse(allocator, entity, value),
            StorageKind::Dense => self.insert_dense(allocator, entity, value),
        }
    }

    fn insert_sparse(
        &mut self,
        allocator: &mut Allocator,
        entity: Entity,
        value: T,
    ) -> CoreResult<Option<T>> {
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize_zeroed(allocator, index + 1)?;
        }

        let existing = self.sparse.get(allocator, index).unwrap_or(0);
        if existing != 0 {
            // Same index: either this entity or a stale occupant. Overwrite.
            let slot = existing as usize - 1;
            let previous = self.values.get(allocator, slot);
            self.entities.set(allocator, slot, entity);
            self.values.set(allocator, slot, value);
            return Ok(previous);
        }

        let slot = self.values.len();
        let id = slot_id(slot)?;
        self.entities.reserve(allocator, 1)?;
        self.values.reserve(allocator, 1)?;
        self.entities.push(allocator, entity)?;
        self.values.push(allocator, value)?;
        self.sparse.set(allocator, index, id);
        self.count += 1;
        Ok(None)
    }

    fn insert_dense(
        &mut self,
        allocator: &mut Allocator,
        entity: Entity,
        value: T,
    ) -> CoreResult<Option<T>> {
        let index = entity.index() as usize;
        if index >= self.entities.len() {
            let old_len = self.entities.len();
            self.entities.resize_zeroed(allocator, index + 1)?;
            if let Err(err) = self.values.resize_zeroed(allocator, index + 1) {
                self.entities.resize_zeroed(allocator, old_len)?;
                return Err(err);
            }
        }

        let occupant = self.entities.get(allocator, index).unwrap_or_else(Entity::zeroed);
        let previous = if occupant.is_occupied() {
            self.values.get(allocator, index)
        } else {
            self.count += 1;
            None
        };
        self.entities.set(allocator, index, entity);
        self.values.set(allocator, index, value);
        Ok(previous)
    }

    /// Removes and returns the component of `entity`.
    ///
    /// Absent components are a no-op returning `None`.
    pub fn remove(&mut self, allocator: &mut Allocator, entity: Entity) -> Option<T> {
        let slot = self.slot_of(allocator, entity)?;
        Some(self.remove_slot(allocator, entity, slot))
    }

    fn remove_slot(&mut self, allocator: &mut Allocator, entity: Entity, slot: usize) -> T {
        let value = match self.kind() {
            StorageKind::Sparse => {
                let value = self
                    .values
                    .swap_remove(allocator, slot)
                    .unwrap_or_else(T::zeroed);
                self.entities.swap_remove(allocator, slot);
                if let Some(moved) = self.entities.get(allocator, slot) {
                    // slot < count, which already fit in u32
                    self.sparse
                        .set(allocator, moved.index() as usize, slot_id(slot).unwrap_or(0));
                }
                self.sparse.set(allocator, entity.index() as usize, 0);
                value
            }
            StorageKind::Dense => {
                let value = self.values.get(allocator, slot).unwrap_or_else(T::zeroed);
                self.entities.set(allocator, slot, Entity::zeroed());
                self.values.set(allocator, slot, T::zeroed());
                value
            }
        };
        self.count -= 1;
        value
    }

    /// Removes every listed entity that has a component here and returns the
    /// removed elements in the order given.
    pub fn take_batch(
        &mut self,
        allocator: &mut Allocator,
        entities: &[Entity],
    ) -> Vec<ComponentSetElement<T>> {
        let mut removed = Vec::new();
        for &entity in entities {
            if let Some(value) = self.remove(allocator, entity) {
                removed.push(ComponentSetElement { entity, value });
            }
        }
        removed
    }

    /// Iterates over `(entity, component)` pairs.
    ///
    /// Sparse sets yield in packed order, dense sets in entity-index order.
    pub fn iter<'a>(&self, allocator: &'a Allocator) -> impl Iterator<Item = (Entity, &'a T)> + 'a {
        self.entities
            .as_slice(allocator)
            .iter()
            .zip(self.values.as_slice(allocator))
            .filter(|(entity, _)| entity.is_occupied())
            .map(|(entity, value)| (*entity, value))
    }

    /// Iterates over the entities that have a component here.
    pub fn entities<'a>(&self, allocator: &'a Allocator) -> impl Iterator<Item = Entity> + 'a {
        self.entities
            .as_slice(allocator)
            .iter()
            .copied()
            .filter(|entity| entity.is_occupied())
    }

    /// Calls `f` on every stored component.
    pub fn for_each_mut(&self, allocator: &mut Allocator, mut f: impl FnMut(Entity, &mut T)) {
        for slot in 0..self.entities.len() {
            let Some(entity) = self.entities.get(allocator, slot) else {
                break;
            };
            if !entity.is_occupied() {
                continue;
            }
            if let Some(value) = self.values.as_mut_slice(allocator).get_mut(slot) {
                f(entity, value);
            }
        }
    }

    /// Frees the backing lists. Does not run destroy handlers.
    pub fn dispose(&mut self, allocator: &mut Allocator) {
        self.sparse.dispose(allocator);
        self.entities.dispose(allocator);
        self.values.dispose(allocator);
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    use crate::ecs::entity::EntityTable;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health {
        current: u32,
    }

    impl Component for Health {
        const STORAGE: StorageKind = StorageKind::Dense;
    }

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<ComponentSet<Position>>(), 68);
    }

    #[test]
    fn test_sparse_insert_get_remove() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let mut set = ComponentSet::<Position>::new();
        assert_eq!(set.kind(), StorageKind::Sparse);

        let a = entities.spawn();
        let b = entities.spawn();
        let c = entities.spawn();
        set.insert(&mut arena, a, Position { x: 1.0, y: 0.0 }).unwrap();
        set.insert(&mut arena, b, Position { x: 2.0, y: 0.0 }).unwrap();
        set.insert(&mut arena, c, Position { x: 3.0, y: 0.0 }).unwrap();
        assert_eq!(set.len(), 3);

        // Removing the first swaps the last into its slot.
        assert_eq!(set.remove(&mut arena, a), Some(Position { x: 1.0, y: 0.0 }));
        assert!(!set.contains(&arena, a));
        assert_eq!(set.get(&arena, c).unwrap().x, 3.0);
        assert_eq!(set.get(&arena, b).unwrap().x, 2.0);
        assert_eq!(set.len(), 2);

        assert_eq!(set.remove(&mut arena, a), None, "absent is a no-op");
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let entity = entities.spawn();

        let mut sparse = ComponentSet::<Position>::new();
        assert_eq!(sparse.insert(&mut arena, entity, Position::default()).unwrap(), None);
        let previous = sparse
            .insert(&mut arena, entity, Position { x: 5.0, y: 5.0 })
            .unwrap();
        assert_eq!(previous, Some(Position::default()));
        assert_eq!(sparse.len(), 1);

        let mut dense = ComponentSet::<Health>::new();
        dense.insert(&mut arena, entity, Health { current: 3 }).unwrap();
        let previous = dense.insert(&mut arena, entity, Health { current: 4 }).unwrap();
        assert_eq!(previous, Some(Health { current: 3 }));
        assert_eq!(dense.len(), 1);
    }

    #[test]
    fn test_dense_holes_are_vacant() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let first = entities.spawn();
        let _skipped = entities.spawn();
        let third = entities.spawn();

        let mut set = ComponentSet::<Health>::new();
        set.insert(&mut arena, third, Health { current: 9 }).unwrap();
        set.insert(&mut arena, first, Health { current: 1 }).unwrap();

        let stored: Vec<_> = set.iter(&arena).map(|(entity, h)| (entity, h.current)).collect();
        assert_eq!(stored, vec![(first, 1), (third, 9)]);

        set.remove(&mut arena, third);
        assert_eq!(set.entities(&arena).collect::<Vec<_>>(), vec![first]);
    }

    #[test]
    fn test_stale_entity_misses() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let old = entities.spawn();
        let mut set = ComponentSet::<Health>::new();
        set.insert(&mut arena, old, Health { current: 1 }).unwrap();
        set.remove(&mut arena, old);
        entities.despawn(old);

        let reused = entities.spawn();
        assert_eq!(reused.index(), old.index());
        set.insert(&mut arena, reused, Health { current: 2 }).unwrap();
        assert!(set.get(&arena, old).is_none());
        assert_eq!(set.get(&arena, reused).unwrap().current, 2);
    }

    #[test]
    fn test_update_and_for_each_mut() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let a = entities.spawn();
        let b = entities.spawn();
        let mut set = ComponentSet::<Position>::new();
        set.insert(&mut arena, a, Position::default()).unwrap();
        set.insert(&mut arena, b, Position::default()).unwrap();

        let result = set.update(&mut arena, a, |_, position| {
            position.x = 10.0;
            7
        });
        assert_eq!(result, Some(7));

        set.for_each_mut(&mut arena, |_, position| position.y += 1.0);
        assert_eq!(*set.get(&arena, a).unwrap(), Position { x: 10.0, y: 1.0 });
        assert_eq!(*set.get(&arena, b).unwrap(), Position { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_take_batch_skips_missing() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let with = entities.spawn();
        let without = entities.spawn();
        let mut set = ComponentSet::<Position>::new();
        set.insert(&mut arena, with, Position { x: 4.0, y: 2.0 }).unwrap();

        let removed = set.take_batch(&mut arena, &[without, with]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entity, with);
        assert!(set.is_empty());
    }

    #[test]
    fn test_dispose_frees_lists() {
        let mut arena = Allocator::with_capacity(1024);
        let mut entities = EntityTable::new();
        let mut set = ComponentSet::<Position>::new();
        for _ in 0..10 {
            set.insert(&mut arena, entities.spawn(), Position::default()).unwrap();
        }
        assert_eq!(arena.live_count(), 3);
        set.dispose(&mut arena);
        assert_eq!(arena.live_count(), 0);
        assert!(set.is_empty());
    }
}
