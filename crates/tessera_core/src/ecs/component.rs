//! # Component System
//!
//! Components are pure data. They must be `Pod` so their bytes can live in
//! the arena; anything dynamic inside a component is a handle
//! ([`MemPtr`](crate::MemPtr)) or an arena-backed list
//! ([`MemList`](crate::MemList)), released by a destroy handler.

use bytemuck::Pod;

/// How a [`ComponentSet`](super::ComponentSet) lays out its values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StorageKind {
    /// Packed values behind a sparse index; removal swaps the last value in.
    /// Suits components few entities have.
    #[default]
    Sparse = 0,
    /// Values indexed directly by entity index, holes left zeroed.
    /// Suits components most entities have.
    Dense = 1,
}

impl StorageKind {
    #[inline]
    pub(crate) const fn from_u32(raw: u32) -> Self {
        match raw {
            1 => Self::Dense,
            _ => Self::Sparse,
        }
    }
}

/// Marker trait for components.
///
/// Components must be:
/// - `Pod`: plain bytes, bitwise copyable, valid when zeroed
/// - `Send + Sync`: snapshots cross to reader threads
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     const STORAGE: StorageKind = StorageKind::Dense;
/// }
/// ```
pub trait Component: Pod + Send + Sync + 'static {
    /// Storage strategy for this component type.
    const STORAGE: StorageKind = StorageKind::Sparse;
}
