//! # Cross-Thread Hand-Off
//!
//! The simulation itself is single-threaded and unsynchronised. The only
//! thing that crosses threads is an immutable [`WorldSnapshot`], published
//! between ticks.
//!
//! ```text
//! Tick N:    simulate ──▶ snapshot ──▶ publish
//! Readers:   latest() returns tick N-1 until the publish lands, then N
//! ```
//!
//! [`WorldSnapshot`]: crate::WorldSnapshot

mod exchange;

pub use exchange::SnapshotExchange;
