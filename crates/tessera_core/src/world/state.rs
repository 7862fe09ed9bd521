//! # World State
//!
//! The central container: one arena, one table per component type, the
//! entity table, and tick bookkeeping. It is also the context handed to
//! delegate invocations.

use std::any::type_name;
use std::sync::Arc;

use super::snapshot::{TableImage, WorldSnapshot};
use super::tick::TickState;
use crate::config::WorldConfig;
use crate::ecs::table::{ComponentTable, ErasedTable};
use crate::ecs::{
    Component, ComponentSet, ComponentSetElement, DestroyContext, DestroyHandler, Entity,
    EntityTable,
};
use crate::error::{CoreResult, SnapshotError};
use crate::index::{DelegateCall, Indexer, TypeIndex};
use crate::memory::{Allocator, DisposeReport};

/// The world - container for all simulation state.
///
/// Component tables are created up front for every component in the
/// registry; [`register_component`](Self::register_component) adds tables
/// for types registered as plain types.
///
/// # Example
///
/// ```rust,ignore
/// let indexer = Arc::new(Indexer::builder().with_component::<Health>().build());
/// let mut world = WorldState::new(indexer, &WorldConfig::default());
///
/// let entity = world.spawn();
/// world.insert(entity, Health { current: 10 })?;
/// world.destroy(entity);
/// ```
pub struct WorldState {
    allocator: Allocator,
    indexer: Arc<Indexer>,
    entities: EntityTable,
    /// Indexed by [`TypeIndex`]; `None` for non-component types.
    tables: Vec<Option<Box<dyn ErasedTable>>>,
    tick: TickState,
}

impl WorldState {
    /// Creates an empty world.
    #[must_use]
    pub fn new(indexer: Arc<Indexer>, config: &WorldConfig) -> Self {
        let tables = indexer
            .types()
            .iter()
            .map(|descriptor| {
                descriptor
                    .table_factory()
                    .map(|factory| factory(descriptor.index(), descriptor.name()))
            })
            .collect();

        Self {
            allocator: Allocator::new(&config.arena),
            indexer,
            entities: EntityTable::new(),
            tables,
            tick: TickState::from_config(&config.tick),
        }
    }

    /// Creates an empty world with default configuration.
    #[must_use]
    pub fn with_defaults(indexer: Arc<Indexer>) -> Self {
        Self::new(indexer, &WorldConfig::default())
    }

    /// Rebuilds a world from a snapshot. Destroy handlers must be set again.
    ///
    /// # Errors
    ///
    /// See [`restore`](Self::restore).
    pub fn from_snapshot(snapshot: &WorldSnapshot, indexer: Arc<Indexer>) -> Result<Self, SnapshotError> {
        let mut world = Self::with_defaults(indexer);
        world.restore(snapshot)?;
        Ok(world)
    }

    /// The registry this world dispatches through.
    #[must_use]
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// The arena.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// The arena, mutably. Cells allocated here are owned by the caller.
    #[inline]
    pub fn allocator_mut(&mut self) -> &mut Allocator {
        &mut self.allocator
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Ensures a table exists for `T` and returns its index.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not in the registry.
    pub fn register_component<T: Component>(&mut self) -> TypeIndex {
        let index = self.indexer.index_of::<T>();
        let position = index.as_usize();
        if self.tables.len() <= position {
            self.tables.resize_with(position + 1, || None);
        }
        if self.tables[position].is_none() {
            let name = self.indexer.type_of(index).name();
            self.tables[position] = Some(Box::new(ComponentTable::<T>::new(index, name)));
        }
        index
    }

    fn table<T: Component>(&self) -> &ComponentTable<T> {
        let index = self.indexer.index_of::<T>();
        self.tables
            .get(index.as_usize())
            .and_then(Option::as_deref)
            .and_then(|table| table.try_cast::<T>())
            .unwrap_or_else(|| panic!("component `{}` has no table", type_name::<T>()))
    }

    /// The typed table plus a destroy context over the rest of the world.
    fn parts_mut<T: Component>(&mut self) -> (&mut ComponentTable<T>, DestroyContext<'_>) {
        let index = self.indexer.index_of::<T>();
        let table = self
            .tables
            .get_mut(index.as_usize())
            .and_then(Option::as_deref_mut)
            .and_then(|table| table.try_cast_mut::<T>())
            .unwrap_or_else(|| panic!("component `{}` has no table", type_name::<T>()));
        let ctx = DestroyContext {
            allocator: &mut self.allocator,
            tick: &self.tick,
        };
        (table, ctx)
    }

    /// Installs the destroy handler for `T`, replacing any previous one.
    pub fn set_destroy_handler<T: Component>(&mut self, handler: impl DestroyHandler<T> + 'static) {
        self.register_component::<T>();
        self.parts_mut::<T>().0.set_handler(Some(Box::new(handler)));
    }

    /// Removes the destroy handler for `T`.
    pub fn clear_destroy_handler<T: Component>(&mut self) {
        self.parts_mut::<T>().0.set_handler(None);
    }

    /// True if `T` has a destroy handler.
    #[must_use]
    pub fn has_destroy_handler<T: Component>(&self) -> bool {
        self.table::<T>().has_handler()
    }

    /// The component set of `T`. Resolve values through
    /// [`allocator`](Self::allocator).
    #[must_use]
    pub fn components<T: Component>(&self) -> &ComponentSet<T> {
        &self.table::<T>().set
    }

    /// Iterates over every `(entity, component)` of type `T`.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.table::<T>().set.iter(&self.allocator)
    }

    /// Calls `f` on every component of type `T`.
    pub fn for_each_mut<T: Component>(&mut self, f: impl FnMut(Entity, &mut T)) {
        let (table, ctx) = self.parts_mut::<T>();
        table.set.for_each_mut(ctx.allocator, f);
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Spawns an entity with no components.
    pub fn spawn(&mut self) -> Entity {
        self.entities.spawn()
    }

    /// True if `entity` is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// The entity table.
    #[must_use]
    pub const fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Destroys one entity. Returns `false` if it was not alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        self.destroy_batch(&[entity]) == 1
    }

    /// Destroys every live entity in `entities`.
    ///
    /// Each table removes its components and hands them to its destroy
    /// handler as one batch. Dead, stale and repeated ids are skipped.
    /// Returns the number of entities destroyed.
    pub fn destroy_batch(&mut self, entities: &[Entity]) -> usize {
        let mut doomed: Vec<Entity> = entities
            .iter()
            .copied()
            .filter(|&entity| self.entities.is_alive(entity))
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        doomed.sort_unstable();
        doomed.dedup();

        let mut ctx = DestroyContext {
            allocator: &mut self.allocator,
            tick: &self.tick,
        };
        for table in self.tables.iter_mut().flatten() {
            table.destroy_entities(&mut ctx, &doomed);
        }
        for &entity in &doomed {
            self.entities.despawn(entity);
        }
        doomed.len()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `value` to `entity`, overwriting any existing `T`.
    ///
    /// The destroy handler does not run on the overwritten value: the new
    /// value is often a modified copy that still holds the same cells. Use
    /// [`replace`](Self::replace) to get the old value back.
    ///
    /// Returns `Ok(false)` if the entity is not alive.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot grow the table.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> CoreResult<bool> {
        if !self.entities.is_alive(entity) {
            return Ok(false);
        }
        self.replace(entity, value)?;
        Ok(true)
    }

    /// Attaches `value` to `entity` and returns the `T` it overwrote.
    ///
    /// Cells owned by the old value and not by the new one are the
    /// caller's to release. Returns `Ok(None)` if there was no previous
    /// value or the entity is not alive (nothing is stored then).
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot grow the table.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> CoreResult<Option<T>> {
        if !self.entities.is_alive(entity) {
            return Ok(None);
        }
        let (table, ctx) = self.parts_mut::<T>();
        table.set.insert(ctx.allocator, entity, value)
    }

    /// Borrows the `T` of `entity`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.table::<T>().set.get(&self.allocator, entity)
    }

    /// Mutably borrows the `T` of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let (table, ctx) = self.parts_mut::<T>();
        table.set.get_mut(ctx.allocator, entity)
    }

    /// True if `entity` has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.table::<T>().set.contains(&self.allocator, entity)
    }

    /// Edits the `T` of `entity` with the arena at hand, e.g. to grow a
    /// list stored in the component.
    pub fn update<T: Component, R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut Allocator, &mut T) -> R,
    ) -> Option<R> {
        let (table, ctx) = self.parts_mut::<T>();
        table.set.update(ctx.allocator, entity, f)
    }

    /// Removes the `T` of `entity` and runs its destroy handler.
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> bool {
        let (table, mut ctx) = self.parts_mut::<T>();
        let Some(value) = table.set.remove(ctx.allocator, entity) else {
            return false;
        };
        table.notify(&mut ctx, &[ComponentSetElement { entity, value }]);
        true
    }

    /// Removes the `T` of `entity` without running its destroy handler.
    /// The caller takes over any cells the value owns.
    pub fn take<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let (table, ctx) = self.parts_mut::<T>();
        table.set.remove(ctx.allocator, entity)
    }

    // =========================================================================
    // Tick & pause
    // =========================================================================

    /// Tick bookkeeping.
    #[inline]
    #[must_use]
    pub const fn tick_state(&self) -> &TickState {
        &self.tick
    }

    /// Tick bookkeeping, mutably (speed, duration, delay).
    #[inline]
    pub fn tick_state_mut(&mut self) -> &mut TickState {
        &mut self.tick
    }

    /// Adds one pause. Returns the new counter value.
    pub fn pause_simulation(&mut self) -> i32 {
        self.tick.pause()
    }

    /// Removes one pause. Returns the new counter value.
    pub fn resume_simulation(&mut self) -> i32 {
        self.tick.resume()
    }

    /// True while at least one pause is held.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.tick.is_paused()
    }

    /// See [`TickState::can_update`].
    #[must_use]
    pub fn can_update(&self) -> bool {
        self.tick.can_update()
    }

    /// See [`TickState::can_late_update`].
    #[must_use]
    pub const fn can_late_update(&self) -> bool {
        self.tick.can_late_update()
    }

    /// See [`TickState::advance`].
    pub fn advance_tick(&mut self) -> Option<f32> {
        self.tick.advance()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Runs a delegate call through the registry.
    ///
    /// # Panics
    ///
    /// Panics if the delegate is not registered.
    pub fn invoke(&mut self, call: DelegateCall) {
        let indexer = Arc::clone(&self.indexer);
        indexer.invoke(self, call);
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Captures the whole state.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let tables = self
            .tables
            .iter()
            .flatten()
            .map(|table| {
                let descriptor = self.indexer.type_of(table.type_index());
                TableImage {
                    type_name: table.type_name().to_owned(),
                    header: table.header_bytes(),
                    value_size: descriptor.size(),
                    value_align: descriptor.align(),
                }
            })
            .collect();

        WorldSnapshot {
            arena: self.allocator.to_image(),
            entities: self.entities.clone(),
            tables,
            tick: self.tick,
            remap: self.indexer.remap_table(),
        }
    }

    /// Replaces the whole state with `snapshot`. Destroy handlers are kept.
    ///
    /// On error the world is unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the arena image is corrupt, or a table names a type that is
    /// not a component in the live registry, or its layout changed.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<(), SnapshotError> {
        let allocator = Allocator::from_image(snapshot.arena.clone())?;

        let mut resolved = Vec::with_capacity(snapshot.tables.len());
        for image in &snapshot.tables {
            let index = self
                .indexer
                .index_by_name(&image.type_name)
                .ok_or_else(|| SnapshotError::UnknownType(image.type_name.clone()))?;
            let descriptor = self.indexer.type_of(index);
            let has_table = self
                .tables
                .get(index.as_usize())
                .is_some_and(Option::is_some);
            if !has_table && !descriptor.is_component() {
                return Err(SnapshotError::UnknownType(image.type_name.clone()));
            }
            if image.value_size != descriptor.size() {
                return Err(SnapshotError::LayoutMismatch {
                    name: image.type_name.clone(),
                    saved: image.value_size,
                    live: descriptor.size(),
                });
            }
            if image.value_align != descriptor.align() {
                return Err(SnapshotError::CorruptImage(format!(
                    "`{}` was saved with alignment {}, live type uses {}",
                    image.type_name,
                    image.value_align,
                    descriptor.align()
                )));
            }
            resolved.push((index, image.header.as_slice()));
        }

        for &(index, _) in &resolved {
            self.ensure_table(index);
        }

        let backup: Vec<(usize, Vec<u8>)> = self
            .tables
            .iter()
            .enumerate()
            .filter_map(|(position, table)| Some((position, table.as_ref()?.header_bytes())))
            .collect();
        for table in self.tables.iter_mut().flatten() {
            table.reset();
        }

        let loaded = resolved.iter().try_for_each(|&(index, header)| {
            match self.tables[index.as_usize()].as_deref_mut() {
                Some(table) => table.load_header(header),
                None => Err(SnapshotError::UnknownType(self.indexer.type_of(index).name().to_owned())),
            }
        });
        if let Err(err) = loaded {
            for (position, header) in backup {
                if let Some(table) = self.tables[position].as_deref_mut() {
                    // Saved from this very table a moment ago.
                    let _ = table.load_header(&header);
                }
            }
            return Err(err);
        }

        let previous = std::mem::replace(&mut self.allocator, allocator);
        self.entities = snapshot.entities.clone();
        self.tick = snapshot.tick;
        tracing::debug!(
            arena = self.allocator.id(),
            replaced_arena = previous.id(),
            tick = self.tick.tick(),
            entities = self.entities.alive_count(),
            "world restored from snapshot"
        );
        previous.dispose();
        Ok(())
    }

    fn ensure_table(&mut self, index: TypeIndex) {
        let position = index.as_usize();
        if self.tables.len() <= position {
            self.tables.resize_with(position + 1, || None);
        }
        if self.tables[position].is_none() {
            let descriptor = self.indexer.type_of(index);
            if let Some(factory) = descriptor.table_factory() {
                self.tables[position] = Some(factory(index, descriptor.name()));
            }
        }
    }

    /// Tears the world down: tables, entities and the arena together.
    ///
    /// Destroy handlers do not run; the arena is released wholesale.
    pub fn dispose(self) -> DisposeReport {
        let entities = self.entities.alive_count();
        let tables = self.tables.iter().flatten().count();
        drop(self.tables);
        let report = self.allocator.dispose();
        tracing::debug!(
            arena = report.arena_id,
            entities,
            tables,
            "world disposed"
        );
        report
    }
}

impl std::fmt::Debug for WorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldState")
            .field("allocator", &self.allocator)
            .field("entities", &self.entities.alive_count())
            .field("tables", &self.tables.iter().flatten().count())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
