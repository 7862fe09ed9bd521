//! # Destroy Handlers
//!
//! Components may own arena cells (through [`MemPtr`](crate::MemPtr) or
//! [`MemList`](crate::MemList) fields). When the owning entity is destroyed,
//! or the component is removed, its handler runs with the removed values and
//! frees whatever they own.
//!
//! Handlers must tolerate zeroed values: a component inserted with default
//! contents and destroyed in the same tick still reaches the handler.

use super::component::Component;
use super::component_set::ComponentSetElement;
use crate::memory::Allocator;
use crate::world::TickState;

/// What a destroy handler can touch.
pub struct DestroyContext<'a> {
    /// The arena owning every nested handle.
    pub allocator: &'a mut Allocator,
    /// Tick bookkeeping at the moment of destruction.
    pub tick: &'a TickState,
}

/// Cleanup callback for one component type.
///
/// Only [`on_destroy`](Self::on_destroy) is required. The batch methods
/// default to calling it per element; override them to amortise work across
/// a batch.
pub trait DestroyHandler<T: Component>: Send + Sync {
    /// Releases whatever `element` owns.
    fn on_destroy(&self, ctx: &mut DestroyContext<'_>, element: &ComponentSetElement<T>);

    /// Batch from sparse storage.
    fn on_destroy_sparse(&self, ctx: &mut DestroyContext<'_>, elements: &[&ComponentSetElement<T>]) {
        for element in elements {
            self.on_destroy(ctx, element);
        }
    }

    /// Batch from dense storage.
    fn on_destroy_dense(&self, ctx: &mut DestroyContext<'_>, elements: &[ComponentSetElement<T>]) {
        for element in elements {
            self.on_destroy(ctx, element);
        }
    }
}

impl<T, F> DestroyHandler<T> for F
where
    T: Component,
    F: Fn(&mut DestroyContext<'_>, &ComponentSetElement<T>) + Send + Sync,
{
    fn on_destroy(&self, ctx: &mut DestroyContext<'_>, element: &ComponentSetElement<T>) {
        self(ctx, element);
    }
}
