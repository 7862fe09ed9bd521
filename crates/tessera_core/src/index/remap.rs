//! Index translation between runs.
//!
//! Indices are only stable within one registration pass. A snapshot stores
//! the names behind every index it used; on load, each saved index is
//! resolved by name against the live registry.

use serde::{Deserialize, Serialize};

use super::ids::{DelegateCall, DelegateIndex, TypeIndex};
use super::registry::Indexer;
use crate::error::SnapshotError;

/// Saved index → stable name, for types and delegates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRemap {
    types: Vec<String>,
    delegates: Vec<String>,
}

impl IndexRemap {
    pub(crate) fn new(types: Vec<String>, delegates: Vec<String>) -> Self {
        Self { types, delegates }
    }

    /// Name saved for a type index.
    #[must_use]
    pub fn type_name(&self, saved: TypeIndex) -> Option<&str> {
        self.types.get(saved.as_usize()).map(String::as_str)
    }

    /// Name saved for a delegate index.
    #[must_use]
    pub fn delegate_name(&self, saved: DelegateIndex) -> Option<&str> {
        self.delegates.get(saved.as_usize()).map(String::as_str)
    }

    /// Maps a saved type index onto `live`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::UnknownType`] if the index was never saved or its
    /// name is not registered in `live`.
    pub fn resolve_type(&self, saved: TypeIndex, live: &Indexer) -> Result<TypeIndex, SnapshotError> {
        let name = self
            .type_name(saved)
            .ok_or_else(|| SnapshotError::UnknownType(format!("#{}", saved.to_raw())))?;
        live.index_by_name(name)
            .ok_or_else(|| SnapshotError::UnknownType(name.to_owned()))
    }

    /// Maps a saved delegate index onto `live`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::UnknownDelegate`] if the index was never saved or its
    /// name is not registered in `live`.
    pub fn resolve_delegate(
        &self,
        saved: DelegateIndex,
        live: &Indexer,
    ) -> Result<DelegateIndex, SnapshotError> {
        let name = self
            .delegate_name(saved)
            .ok_or_else(|| SnapshotError::UnknownDelegate(format!("#{}", saved.to_raw())))?;
        live.delegate_index_of(name)
            .ok_or_else(|| SnapshotError::UnknownDelegate(name.to_owned()))
    }

    /// Rewrites the delegate of a saved call; the payload handle is kept.
    ///
    /// # Errors
    ///
    /// As [`resolve_delegate`](Self::resolve_delegate).
    pub fn resolve_call(&self, saved: DelegateCall, live: &Indexer) -> Result<DelegateCall, SnapshotError> {
        Ok(DelegateCall::new(
            self.resolve_delegate(saved.delegate, live)?,
            saved.payload,
        ))
    }
}
