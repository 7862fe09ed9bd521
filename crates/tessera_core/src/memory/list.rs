//! # Arena-Backed List
//!
//! [`MemList`] is a growable sequence whose elements live in one arena cell.
//! The list header is plain bytes (`{storage, len, capacity}`) and can be
//! embedded in components or other cells; it moves with the arena because it
//! holds a handle, not an address.

// SAFETY: the Pod/Zeroable impls below are for a repr(C) header whose fields
// are all Pod and leave no padding. Generic structs cannot use the derive.
#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use super::allocator::Allocator;
use super::handle::MemPtr;
use crate::error::{AllocError, CoreResult};

/// Capacity of the first storage cell.
const MIN_CAPACITY: usize = 4;

/// Growable list stored in an arena cell.
///
/// Every operation that touches elements takes the owning allocator. The
/// list owns at most one cell; [`MemList::dispose`] releases it. A zeroed
/// header is a valid empty list, so zero-initialised components need no
/// setup before use or cleanup.
#[repr(C)]
pub struct MemList<T> {
    storage: MemPtr,
    len: u32,
    capacity: u32,
    _marker: PhantomData<T>,
}

// SAFETY: `MemPtr` is Pod (three u32), followed by two u32. Total 20 bytes,
// alignment 4, no padding. `PhantomData` is zero-sized.
unsafe impl<T: Pod> Zeroable for MemList<T> {}
// SAFETY: see above; every bit pattern is a valid header.
unsafe impl<T: Pod> Pod for MemList<T> {}

impl<T> Clone for MemList<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemList<T> {}

impl<T> PartialEq for MemList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.storage == other.storage && self.len == other.len && self.capacity == other.capacity
    }
}

impl<T> Eq for MemList<T> {}

impl<T> Default for MemList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemList")
            .field("storage", &self.storage)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> MemList<T> {
    /// An empty list with no storage cell.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: MemPtr::NULL,
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// True if the list holds no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current cell can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// The storage cell, null until the first push.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> MemPtr {
        self.storage
    }

    /// Drops all elements but keeps the storage cell.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<T: Pod> MemList<T> {
    /// A list with room for `capacity` elements.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot fit the storage cell.
    pub fn with_capacity(allocator: &mut Allocator, capacity: usize) -> CoreResult<Self> {
        let mut list = Self::new();
        if capacity > 0 {
            list.reserve_exact(allocator, capacity)?;
        }
        Ok(list)
    }

    /// Elements as a slice.
    #[must_use]
    pub fn as_slice<'a>(&self, allocator: &'a Allocator) -> &'a [T] {
        if self.storage.is_null() {
            return &[];
        }
        &allocator.slice::<T>(self.storage, self.capacity())[..self.len()]
    }

    /// Elements as a mutable slice.
    pub fn as_mut_slice<'a>(&self, allocator: &'a mut Allocator) -> &'a mut [T] {
        if self.storage.is_null() {
            return &mut [];
        }
        &mut allocator.slice_mut::<T>(self.storage, self.capacity())[..self.len()]
    }

    /// Copies of the elements, front to back.
    pub fn iter<'a>(&self, allocator: &'a Allocator) -> impl Iterator<Item = T> + 'a {
        self.as_slice(allocator).iter().copied()
    }

    /// Copy of the element at `index`.
    #[must_use]
    pub fn get(&self, allocator: &Allocator, index: usize) -> Option<T> {
        self.as_slice(allocator).get(index).copied()
    }

    /// Overwrites the element at `index`. Returns false if out of bounds.
    pub fn set(&self, allocator: &mut Allocator, index: usize, value: T) -> bool {
        match self.as_mut_slice(allocator).get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Appends an element, growing the storage cell if needed.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot fit a larger cell. The list is unchanged.
    pub fn push(&mut self, allocator: &mut Allocator, value: T) -> CoreResult<()> {
        if self.len == self.capacity {
            self.reserve(allocator, 1)?;
        }
        let index = self.len();
        allocator.slice_mut::<T>(self.storage, self.capacity())[index] = value;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self, allocator: &Allocator) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(allocator.slice::<T>(self.storage, self.capacity())[self.len()])
    }

    /// Removes the element at `index`, moving the last element into its place.
    pub fn swap_remove(&mut self, allocator: &mut Allocator, index: usize) -> Option<T> {
        let slice = self.as_mut_slice(allocator);
        if index >= slice.len() {
            return None;
        }
        let last = slice.len() - 1;
        slice.swap(index, last);
        let removed = slice[last];
        self.len -= 1;
        Some(removed)
    }

    /// Grows or shrinks to `len`, zero-filling new elements.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot fit a larger cell.
    pub fn resize_zeroed(&mut self, allocator: &mut Allocator, len: usize) -> CoreResult<()> {
        let new_len = u32::try_from(len).map_err(|_| AllocError::IndexOverflow(len))?;
        if len > self.capacity() {
            self.reserve(allocator, len - self.len())?;
        }
        if len > self.len() {
            let old = self.len();
            allocator.slice_mut::<T>(self.storage, self.capacity())[old..len].fill(T::zeroed());
        }
        self.len = new_len;
        Ok(())
    }

    /// Ensures room for `additional` more elements, doubling the capacity.
    ///
    /// # Errors
    ///
    /// Fails if the arena cannot fit a larger cell.
    pub fn reserve(&mut self, allocator: &mut Allocator, additional: usize) -> CoreResult<()> {
        let required = self.len() + additional;
        if required <= self.capacity() {
            return Ok(());
        }
        let target = required.max(self.capacity() * 2).max(MIN_CAPACITY);
        self.reserve_exact(allocator, target)
    }

    /// Moves the elements into a fresh cell of exactly `capacity` elements.
    fn reserve_exact(&mut self, allocator: &mut Allocator, capacity: usize) -> CoreResult<()> {
        assert!(size_of::<T>() > 0, "MemList does not store zero-sized types");
        let new_capacity =
            u32::try_from(capacity).map_err(|_| AllocError::IndexOverflow(capacity))?;
        let bytes = capacity
            .checked_mul(size_of::<T>())
            .ok_or(AllocError::IndexOverflow(capacity))?;

        let storage = allocator.alloc_bytes(bytes)?;
        if !self.storage.is_null() {
            allocator.copy_bytes(self.storage, storage, self.len() * size_of::<T>());
            allocator.free(self.storage);
        }
        self.storage = storage;
        self.capacity = new_capacity;
        Ok(())
    }

    /// True if any element equals `value`.
    #[must_use]
    pub fn contains(&self, allocator: &Allocator, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.as_slice(allocator).contains(value)
    }

    /// Removes the first element equal to `value` (order not preserved).
    pub fn remove_item(&mut self, allocator: &mut Allocator, value: &T) -> bool
    where
        T: PartialEq,
    {
        let position = self.as_slice(allocator).iter().position(|item| item == value);
        match position {
            Some(index) => self.swap_remove(allocator, index).is_some(),
            None => false,
        }
    }

    /// Frees the storage cell and resets the header to empty.
    ///
    /// Disposing an empty or zeroed list is a no-op.
    pub fn dispose(&mut self, allocator: &mut Allocator) {
        allocator.free(self.storage);
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_pod() {
        assert_eq!(size_of::<MemList<u64>>(), 20);
        let zeroed = MemList::<u32>::zeroed();
        assert_eq!(zeroed, MemList::new());
        assert!(zeroed.is_empty());
    }

    #[test]
    fn test_push_pop_index() {
        let mut arena = Allocator::with_capacity(256);
        let mut list = MemList::<u32>::new();
        for i in 0..10 {
            list.push(&mut arena, i * 3).unwrap();
        }
        assert_eq!(list.len(), 10);
        assert_eq!(list.get(&arena, 4), Some(12));
        assert_eq!(list.get(&arena, 10), None);
        assert!(list.set(&mut arena, 0, 99));
        assert_eq!(list.as_slice(&arena)[0], 99);
        assert_eq!(list.pop(&arena), Some(27));
        assert_eq!(list.len(), 9);
    }

    #[test]
    fn test_growth_keeps_one_cell() {
        let mut arena = Allocator::with_capacity(256);
        let mut list = MemList::<u64>::new();
        for i in 0..100 {
            list.push(&mut arena, i).unwrap();
        }
        assert_eq!(arena.live_count(), 1, "old cells are freed on growth");
        assert_eq!(list.iter(&arena).sum::<u64>(), (0..100).sum());
    }

    #[test]
    fn test_swap_remove() {
        let mut arena = Allocator::with_capacity(256);
        let mut list = MemList::<u8>::new();
        for value in [1, 2, 3, 4] {
            list.push(&mut arena, value).unwrap();
        }
        assert_eq!(list.swap_remove(&mut arena, 1), Some(2));
        assert_eq!(list.as_slice(&arena), &[1, 4, 3]);
        assert_eq!(list.swap_remove(&mut arena, 7), None);
        assert!(list.remove_item(&mut arena, &3));
        assert!(!list.contains(&arena, &3));
    }

    #[test]
    fn test_resize_zeroed() {
        let mut arena = Allocator::with_capacity(256);
        let mut list = MemList::<u32>::new();
        list.push(&mut arena, 5).unwrap();
        list.resize_zeroed(&mut arena, 6).unwrap();
        assert_eq!(list.as_slice(&arena), &[5, 0, 0, 0, 0, 0]);
        list.resize_zeroed(&mut arena, 2).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_dispose_releases_storage() {
        let mut arena = Allocator::with_capacity(256);
        let mut list = MemList::<u32>::with_capacity(&mut arena, 8).unwrap();
        list.push(&mut arena, 1).unwrap();
        assert_eq!(arena.live_count(), 1);

        list.dispose(&mut arena);
        assert_eq!(arena.live_count(), 0);
        assert!(list.is_empty());

        // Second dispose on the reset header is harmless.
        list.dispose(&mut arena);
        assert_eq!(arena.stats().frees, 1);
    }

    #[test]
    fn test_list_stored_inside_arena() {
        let mut arena = Allocator::with_capacity(256);
        let mut inner = MemList::<u16>::new();
        inner.push(&mut arena, 7).unwrap();
        let header = arena.alloc_value(inner).unwrap();

        let moved = arena.clone();
        let loaded: MemList<u16> = *moved.get(header);
        assert_eq!(loaded.as_slice(&moved), &[7]);
    }
}
