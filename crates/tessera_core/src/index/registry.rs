//! # Type & Delegate Registry
//!
//! Marked types and proxy capabilities get dense, zero-based integer ids in
//! registration order. Registration happens in one deterministic pass at
//! startup through [`IndexerBuilder`]; the built [`Indexer`] is read-only
//! and shared by `Arc` (or installed once per process).
//!
//! ```text
//! types:      [ TypeDescriptor #0, #1, #2, ... ]     <- TypeIndex
//! delegates:  [ name #0, name #1, ... ]              <- DelegateIndex
//! invokers:   [ fn #0,   fn #1,   ... ]              <- same positions
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};
use std::sync::{Arc, OnceLock};

use super::ids::{DelegateCall, DelegateIndex, TypeIndex};
use super::remap::IndexRemap;
use crate::ecs::table::{new_table, TableFactory};
use crate::ecs::Component;
use crate::memory::MemPtr;
use crate::world::WorldState;

/// Function invoked for a delegate call.
pub type Invoker = fn(&mut WorldState, MemPtr);

/// A callable capability addressable by [`DelegateIndex`].
pub trait Proxy: 'static {
    /// Stable name, used to resolve saved indices across runs.
    const NAME: &'static str;

    /// Runs the capability against the world with its argument cell.
    fn invoke(world: &mut WorldState, payload: MemPtr);
}

/// Diagnostics and dispatch data for one registered type.
#[derive(Clone)]
pub struct TypeDescriptor {
    index: TypeIndex,
    name: &'static str,
    type_id: TypeId,
    size: usize,
    align: usize,
    table: Option<TableFactory>,
}

impl TypeDescriptor {
    /// Dense index.
    #[must_use]
    pub const fn index(&self) -> TypeIndex {
        self.index
    }

    /// Stable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type id.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// `size_of` the type.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// `align_of` the type.
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// True if the type was registered as a component.
    #[must_use]
    pub const fn is_component(&self) -> bool {
        self.table.is_some()
    }

    pub(crate) const fn table_factory(&self) -> Option<TableFactory> {
        self.table
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("component", &self.is_component())
            .finish()
    }
}

/// Diagnostics for one registered delegate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegateDescriptor {
    index: DelegateIndex,
    name: &'static str,
}

impl DelegateDescriptor {
    /// Dense index.
    #[must_use]
    pub const fn index(&self) -> DelegateIndex {
        self.index
    }

    /// Stable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Collects registrations, then freezes into an [`Indexer`].
#[derive(Default)]
pub struct IndexerBuilder {
    types: Vec<TypeDescriptor>,
    by_type: HashMap<TypeId, TypeIndex>,
    by_name: HashMap<&'static str, TypeIndex>,
    delegates: Vec<DelegateDescriptor>,
    invokers: Vec<Invoker>,
    by_delegate_name: HashMap<&'static str, DelegateIndex>,
}

impl IndexerBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under its Rust type name.
    pub fn register_type<T: 'static>(&mut self) -> TypeIndex {
        self.register_type_named::<T>(type_name::<T>())
    }

    /// Registers `T` under an explicit stable name.
    ///
    /// Registering the same type again returns its existing index.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn register_type_named<T: 'static>(&mut self, name: &'static str) -> TypeIndex {
        self.insert_type::<T>(name, None)
    }

    /// Registers a component type; the world builds a table for it.
    pub fn register_component<T: Component>(&mut self) -> TypeIndex {
        self.register_component_named::<T>(type_name::<T>())
    }

    /// Registers a component type under an explicit stable name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn register_component_named<T: Component>(&mut self, name: &'static str) -> TypeIndex {
        self.insert_type::<T>(name, Some(new_table::<T> as TableFactory))
    }

    fn insert_type<T: 'static>(&mut self, name: &'static str, table: Option<TableFactory>) -> TypeIndex {
        let type_id = TypeId::of::<T>();
        if let Some(&index) = self.by_type.get(&type_id) {
            let descriptor = &mut self.types[index.as_usize()];
            // A plain registration followed by a component registration upgrades it.
            if descriptor.table.is_none() {
                descriptor.table = table;
            }
            return index;
        }

        if let Some(&taken) = self.by_name.get(name) {
            panic!(
                "type name `{name}` already registered for {:?}",
                self.types[taken.as_usize()]
            );
        }

        let raw = u32::try_from(self.types.len()).unwrap_or(u32::MAX);
        assert!(raw < u32::MAX, "type index space exhausted");
        let index = TypeIndex::from_raw(raw);
        self.types.push(TypeDescriptor {
            index,
            name,
            type_id,
            size: size_of::<T>(),
            align: align_of::<T>(),
            table,
        });
        self.by_type.insert(type_id, index);
        self.by_name.insert(name, index);
        index
    }

    /// Registers a proxy under [`Proxy::NAME`].
    pub fn register_proxy<P: Proxy>(&mut self) -> DelegateIndex {
        self.register_delegate(P::NAME, P::invoke)
    }

    /// Registers a named delegate.
    ///
    /// Registering a name again returns its existing index and keeps the
    /// first invoker.
    pub fn register_delegate(&mut self, name: &'static str, invoker: Invoker) -> DelegateIndex {
        if let Some(&index) = self.by_delegate_name.get(name) {
            return index;
        }
        let raw = u32::try_from(self.delegates.len()).unwrap_or(u32::MAX);
        assert!(raw < u32::MAX, "delegate index space exhausted");
        let index = DelegateIndex::from_raw(raw);
        self.delegates.push(DelegateDescriptor { index, name });
        self.invokers.push(invoker);
        self.by_delegate_name.insert(name, index);
        index
    }

    /// Chaining form of [`register_type`](Self::register_type).
    #[must_use]
    pub fn with_type<T: 'static>(mut self) -> Self {
        self.register_type::<T>();
        self
    }

    /// Chaining form of [`register_component`](Self::register_component).
    #[must_use]
    pub fn with_component<T: Component>(mut self) -> Self {
        self.register_component::<T>();
        self
    }

    /// Chaining form of [`register_proxy`](Self::register_proxy).
    #[must_use]
    pub fn with_proxy<P: Proxy>(mut self) -> Self {
        self.register_proxy::<P>();
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> Indexer {
        tracing::debug!(
            types = self.types.len(),
            delegates = self.delegates.len(),
            "type registry built"
        );
        Indexer {
            types: self.types,
            by_type: self.by_type,
            by_name: self.by_name,
            delegates: self.delegates,
            invokers: self.invokers,
            by_delegate_name: self.by_delegate_name,
        }
    }
}

static GLOBAL: OnceLock<Arc<Indexer>> = OnceLock::new();

/// Read-only registry of types and delegates.
#[derive(Default)]
pub struct Indexer {
    types: Vec<TypeDescriptor>,
    by_type: HashMap<TypeId, TypeIndex>,
    by_name: HashMap<&'static str, TypeIndex>,
    delegates: Vec<DelegateDescriptor>,
    invokers: Vec<Invoker>,
    by_delegate_name: HashMap<&'static str, DelegateIndex>,
}

impl Indexer {
    /// Shorthand for [`IndexerBuilder::new`].
    #[must_use]
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::new()
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of registered delegates.
    #[must_use]
    pub fn delegate_count(&self) -> usize {
        self.delegates.len()
    }

    /// Index of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    #[must_use]
    pub fn index_of<T: 'static>(&self) -> TypeIndex {
        match self.try_index_of::<T>() {
            Some(index) => index,
            None => panic!("type `{}` is not registered", type_name::<T>()),
        }
    }

    /// Index of `T`, if registered.
    #[must_use]
    pub fn try_index_of<T: 'static>(&self) -> Option<TypeIndex> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Index registered under a stable name.
    #[must_use]
    pub fn index_by_name(&self, name: &str) -> Option<TypeIndex> {
        self.by_name.get(name).copied()
    }

    /// Descriptor of a registered type.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn type_of(&self, index: TypeIndex) -> &TypeDescriptor {
        &self.types[index.as_usize()]
    }

    /// Descriptor of a type, if `index` is in range.
    #[must_use]
    pub fn try_type_of(&self, index: TypeIndex) -> Option<&TypeDescriptor> {
        self.types.get(index.as_usize())
    }

    /// All type descriptors in index order.
    #[must_use]
    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    /// Index of the delegate registered under `name`.
    #[must_use]
    pub fn delegate_index_of(&self, name: &str) -> Option<DelegateIndex> {
        self.by_delegate_name.get(name).copied()
    }

    /// Index of proxy `P`.
    ///
    /// # Panics
    ///
    /// Panics if `P` was never registered.
    #[must_use]
    pub fn proxy_index<P: Proxy>(&self) -> DelegateIndex {
        match self.delegate_index_of(P::NAME) {
            Some(index) => index,
            None => panic!("proxy `{}` is not registered", P::NAME),
        }
    }

    /// Descriptor of a registered delegate.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn delegate_of(&self, index: DelegateIndex) -> &DelegateDescriptor {
        &self.delegates[index.as_usize()]
    }

    /// All delegate descriptors in index order.
    #[must_use]
    pub fn delegates(&self) -> &[DelegateDescriptor] {
        &self.delegates
    }

    /// A call to proxy `P` with `payload`.
    #[must_use]
    pub fn call<P: Proxy>(&self, payload: MemPtr) -> DelegateCall {
        DelegateCall::new(self.proxy_index::<P>(), payload)
    }

    /// Runs `call` against `world`.
    ///
    /// # Panics
    ///
    /// Panics if the delegate index is out of range.
    pub fn invoke(&self, world: &mut WorldState, call: DelegateCall) {
        let invoker = self.invokers[call.delegate.as_usize()];
        invoker(world, call.payload);
    }

    /// The invoker of `index`, if in range.
    #[must_use]
    pub fn invoker(&self, index: DelegateIndex) -> Option<Invoker> {
        self.invokers.get(index.as_usize()).copied()
    }

    /// Index-to-name table for persisting indices across runs.
    #[must_use]
    pub fn remap_table(&self) -> IndexRemap {
        IndexRemap::new(
            self.types.iter().map(|t| t.name.to_owned()).collect(),
            self.delegates.iter().map(|d| d.name.to_owned()).collect(),
        )
    }

    /// Makes this registry the process-wide one.
    ///
    /// # Errors
    ///
    /// Returns the registry back if one is already installed.
    pub fn install(self) -> Result<&'static Self, Self> {
        let mut candidate = Some(self);
        let installed = GLOBAL.get_or_init(|| Arc::new(candidate.take().unwrap_or_default()));
        match candidate {
            Some(rejected) => Err(rejected),
            None => Ok(&**installed),
        }
    }

    /// The process-wide registry, if installed.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get().map(|indexer| &**indexer)
    }

    /// Shared handle to the process-wide registry, if installed.
    #[must_use]
    pub fn global_arc() -> Option<Arc<Self>> {
        GLOBAL.get().cloned()
    }
}

impl fmt::Debug for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indexer")
            .field("types", &self.types)
            .field("delegates", &self.delegates)
            .finish()
    }
}
