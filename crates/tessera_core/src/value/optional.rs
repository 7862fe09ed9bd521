//! # Optional Value
//!
//! An `Option` that is plain bytes, so it can sit inside components and
//! arena cells. When disabled the payload is always the zero value.

// SAFETY: Pod/Zeroable are implemented by hand for a packed generic struct.
#![allow(unsafe_code)]

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};

/// A value plus an enabled flag.
///
/// Invariants:
/// - disabled → [`OptionalValue::get_value`] returns `T::zeroed()`;
/// - assigning a raw `T` (via [`OptionalValue::set`] or `From<T>`) enables it;
/// - the hash code of a disabled value is the bitwise inverse of the payload
///   hash, so it never collides with an enabled zero value.
#[repr(C, packed)]
pub struct OptionalValue<T> {
    value: T,
    enabled: u8,
}

// SAFETY: packed repr leaves no padding; `T: Pod` and `u8` accept any bits.
unsafe impl<T: Pod> Zeroable for OptionalValue<T> {}
// SAFETY: as above. Fields are only ever read by copy, never by reference.
unsafe impl<T: Pod> Pod for OptionalValue<T> {}

impl<T: Copy> Clone for OptionalValue<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Copy> Copy for OptionalValue<T> {}

impl<T: Pod> Default for OptionalValue<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Pod> OptionalValue<T> {
    /// A disabled value.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            value: T::zeroed(),
            enabled: 0,
        }
    }

    /// An enabled value.
    #[inline]
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value, enabled: 1 }
    }

    /// True if a value is present.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled != 0
    }

    /// The payload, or the zero value when disabled.
    #[inline]
    #[must_use]
    pub fn get_value(&self) -> T {
        self.try_get_value().unwrap_or_else(T::zeroed)
    }

    /// The payload if enabled.
    #[inline]
    #[must_use]
    pub fn try_get_value(&self) -> Option<T> {
        let value = self.value;
        self.is_enabled().then_some(value)
    }

    /// Stores `value` and enables the slot.
    #[inline]
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.enabled = 1;
    }

    /// Disables the slot and zeroes the payload.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Takes the payload out, leaving the slot disabled.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        let value = self.try_get_value();
        self.clear();
        value
    }

    /// Hash of the payload, inverted when disabled.
    #[must_use]
    pub fn hash_code(&self) -> u64
    where
        T: Hash,
    {
        let value = self.get_value();
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        let hash = hasher.finish();
        if self.is_enabled() {
            hash
        } else {
            !hash
        }
    }
}

impl<T: Pod> From<T> for OptionalValue<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Pod> From<Option<T>> for OptionalValue<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::empty, Self::new)
    }
}

impl<T: Pod> From<OptionalValue<T>> for Option<T> {
    fn from(value: OptionalValue<T>) -> Self {
        value.try_get_value()
    }
}

impl<T: Pod + PartialEq> PartialEq for OptionalValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_enabled() == other.is_enabled() && self.get_value() == other.get_value()
    }
}

impl<T: Pod + Eq> Eq for OptionalValue<T> {}

impl<T: Pod + Hash> Hash for OptionalValue<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for OptionalValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_get_value() {
            Some(value) => f.debug_tuple("Enabled").field(&value).finish(),
            None => f.write_str("Disabled"),
        }
    }
}
