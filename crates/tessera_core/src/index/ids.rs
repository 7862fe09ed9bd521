//! Dense ids handed out by the [`Indexer`](super::Indexer), plus the
//! plain-data delegate call that stores "what to run next" in the arena.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::memory::MemPtr;

/// Dense identity of a registered type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct TypeIndex(u32);

impl TypeIndex {
    /// Wraps a raw index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// The raw index as a table position.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<TypeIndex> for u32 {
    fn from(index: TypeIndex) -> Self {
        index.0
    }
}

/// Dense identity of a registered delegate.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct DelegateIndex(u32);

impl DelegateIndex {
    /// Wraps a raw index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// The raw index as a table position.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<DelegateIndex> for u32 {
    fn from(index: DelegateIndex) -> Self {
        index.0
    }
}

/// A deferred call: which delegate to run and the arena cell it reads.
///
/// Plain bytes, so a component can hold "what runs next".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct DelegateCall {
    /// Delegate to invoke.
    pub delegate: DelegateIndex,
    /// Argument cell; may be null.
    pub payload: MemPtr,
}

impl DelegateCall {
    /// A call to `delegate` with `payload`.
    #[must_use]
    pub const fn new(delegate: DelegateIndex, payload: MemPtr) -> Self {
        Self { delegate, payload }
    }
}
