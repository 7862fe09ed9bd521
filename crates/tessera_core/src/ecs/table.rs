//! Type-erased component tables.
//!
//! The world keeps one boxed table per registered component, indexed by
//! [`TypeIndex`]. Entity destruction walks every table through the erased
//! interface; typed access downcasts back to [`ComponentTable<T>`].

use std::any::Any;
use std::mem::size_of;

use super::component::{Component, StorageKind};
use super::component_set::{ComponentSet, ComponentSetElement};
use super::destroy::{DestroyContext, DestroyHandler};
use super::entity::Entity;
use crate::error::SnapshotError;
use crate::index::TypeIndex;
use crate::memory::Allocator;

pub(crate) trait ErasedTable: Any + Send + Sync {
    fn type_index(&self) -> TypeIndex;
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn contains(&self, allocator: &Allocator, entity: Entity) -> bool;

    /// Removes the listed entities' components and notifies the handler.
    /// Returns how many components were removed.
    fn destroy_entities(&mut self, ctx: &mut DestroyContext<'_>, entities: &[Entity]) -> usize;

    /// Raw bytes of the set header.
    fn header_bytes(&self) -> Vec<u8>;
    fn load_header(&mut self, bytes: &[u8]) -> Result<(), SnapshotError>;
    /// Forgets the stored header without touching the arena.
    fn reset(&mut self);

    // This may be unnecessary once trait upcasting is stable on our MSRV
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn ErasedTable {
    pub(crate) fn try_cast<T: Component>(&self) -> Option<&ComponentTable<T>> {
        self.as_any().downcast_ref()
    }

    pub(crate) fn try_cast_mut<T: Component>(&mut self) -> Option<&mut ComponentTable<T>> {
        self.as_any_mut().downcast_mut()
    }
}

pub(crate) struct ComponentTable<T: Component> {
    index: TypeIndex,
    name: &'static str,
    pub(crate) set: ComponentSet<T>,
    handler: Option<Box<dyn DestroyHandler<T>>>,
}

impl<T: Component> ComponentTable<T> {
    pub(crate) fn new(index: TypeIndex, name: &'static str) -> Self {
        Self {
            index,
            name,
            set: ComponentSet::new(),
            handler: None,
        }
    }

    pub(crate) fn set_handler(&mut self, handler: Option<Box<dyn DestroyHandler<T>>>) {
        self.handler = handler;
    }

    pub(crate) fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Hands removed elements to the handler in the batch shape of the set.
    pub(crate) fn notify(&self, ctx: &mut DestroyContext<'_>, elements: &[ComponentSetElement<T>]) {
        let Some(handler) = self.handler.as_deref() else {
            return;
        };
        if elements.is_empty() {
            return;
        }
        match self.set.kind() {
            StorageKind::Sparse => {
                let batch: Vec<&ComponentSetElement<T>> = elements.iter().collect();
                handler.on_destroy_sparse(ctx, &batch);
            }
            StorageKind::Dense => handler.on_destroy_dense(ctx, elements),
        }
    }
}

impl<T: Component> ErasedTable for ComponentTable<T> {
    fn type_index(&self) -> TypeIndex {
        self.index
    }

    fn type_name(&self) -> &'static str {
        self.name
    }

    fn len(&self) -> usize {
        self.set.len()
    }

    fn contains(&self, allocator: &Allocator, entity: Entity) -> bool {
        self.set.contains(allocator, entity)
    }

    fn destroy_entities(&mut self, ctx: &mut DestroyContext<'_>, entities: &[Entity]) -> usize {
        let removed = self.set.take_batch(ctx.allocator, entities);
        self.notify(ctx, &removed);
        removed.len()
    }

    fn header_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.set).to_vec()
    }

    fn load_header(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let set: ComponentSet<T> =
            bytemuck::try_pod_read_unaligned(bytes).map_err(|_| SnapshotError::LayoutMismatch {
                name: self.name.to_owned(),
                saved: bytes.len(),
                live: size_of::<ComponentSet<T>>(),
            })?;
        if set.kind() != T::STORAGE {
            return Err(SnapshotError::CorruptImage(format!(
                "`{}` was saved with {:?} storage, live type uses {:?}",
                self.name,
                set.kind(),
                T::STORAGE
            )));
        }
        self.set = set;
        Ok(())
    }

    fn reset(&mut self) {
        self.set = ComponentSet::new();
    }

    fn as_any(&self) -> &dyn Any {
        self as &dyn Any
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self as &mut dyn Any
    }
}

/// Table constructor stored in the type descriptor of every component.
pub(crate) fn new_table<T: Component>(index: TypeIndex, name: &'static str) -> Box<dyn ErasedTable> {
    Box::new(ComponentTable::<T>::new(index, name))
}

pub(crate) type TableFactory = fn(TypeIndex, &'static str) -> Box<dyn ErasedTable>;
