//! # One-Shot Value
//!
//! A quantity that is accrued during one tick and consumed exactly once.
//! Reading with [`OneShotValue::take`] clears it, so the next tick never
//! applies the same amount twice. An empty slot reads as zero.

// SAFETY: Pod/Zeroable are implemented by hand for a packed generic struct.
#![allow(unsafe_code)]

use std::fmt;
use std::ops::Add;

use bytemuck::{Pod, Zeroable};

/// Consume-once value cell.
#[repr(C, packed)]
pub struct OneShotValue<T> {
    value: T,
    pending: u8,
}

// SAFETY: packed repr leaves no padding; `T: Pod` and `u8` accept any bits.
unsafe impl<T: Pod> Zeroable for OneShotValue<T> {}
// SAFETY: as above. Fields are only ever read by copy, never by reference.
unsafe impl<T: Pod> Pod for OneShotValue<T> {}

impl<T: Copy> Clone for OneShotValue<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Copy> Copy for OneShotValue<T> {}

impl<T: Pod> Default for OneShotValue<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Pod> OneShotValue<T> {
    /// Nothing pending.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            value: T::zeroed(),
            pending: 0,
        }
    }

    /// A pending value.
    #[inline]
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value, pending: 1 }
    }

    /// True if a value is waiting to be consumed.
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending != 0
    }

    /// Replaces the pending value.
    #[inline]
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.pending = 1;
    }

    /// Adds `amount` to the pending value, starting from zero if empty.
    #[inline]
    pub fn accrue(&mut self, amount: T)
    where
        T: Add<Output = T>,
    {
        let current = self.value;
        self.value = if self.is_pending() { current + amount } else { amount };
        self.pending = 1;
    }

    /// Reads without consuming.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        let value = self.value;
        self.is_pending().then_some(value)
    }

    /// Returns the pending value (zero if none) and clears the slot.
    #[inline]
    pub fn take(&mut self) -> T {
        let value = self.value;
        *self = Self::empty();
        value
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for OneShotValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(value) => f.debug_tuple("Pending").field(&value).finish(),
            None => f.write_str("Empty"),
        }
    }
}
