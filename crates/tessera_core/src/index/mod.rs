//! # Type & Delegate Indexing
//!
//! Dense integer identities replace `TypeId`s and virtual dispatch in
//! everything that is stored: component tables are addressed by
//! [`TypeIndex`], deferred calls by [`DelegateIndex`]. The registry keeps a
//! `TypeId` map only to answer typed lookups such as
//! [`Indexer::index_of`].

mod ids;
mod registry;
mod remap;

pub use ids::{DelegateCall, DelegateIndex, TypeIndex};
pub use registry::{
    DelegateDescriptor, Indexer, IndexerBuilder, Invoker, Proxy, TypeDescriptor,
};
pub use remap::IndexRemap;
