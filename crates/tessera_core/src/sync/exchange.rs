//! # Snapshot Exchange
//!
//! Hands the latest world snapshot from the tick thread to any number of
//! reader threads.
//!
//! ```text
//!   Tick thread                     Reader threads
//!   ───────────                     ──────────────
//!   world.snapshot()
//!        │ publish()
//!        ▼
//!   ┌───────────────────────────┐   latest()
//!   │ RwLock<Arc<WorldSnapshot>>│ ─────────────▶ Arc<WorldSnapshot>
//!   └───────────────────────────┘   (held as long as needed)
//! ```
//!
//! The lock is held only to swap or clone the `Arc`, never while a reader
//! walks a snapshot, so the tick thread never waits on presentation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::world::WorldSnapshot;

/// Latest-value slot for world snapshots.
#[derive(Debug, Default)]
pub struct SnapshotExchange {
    latest: RwLock<Option<Arc<WorldSnapshot>>>,
    /// Number of snapshots published so far.
    generation: AtomicU64,
}

impl SnapshotExchange {
    /// An empty exchange, shared.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the published snapshot. Returns the new generation.
    pub fn publish(&self, snapshot: WorldSnapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        *self.latest.write() = Some(snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// The most recent snapshot, if any has been published.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<WorldSnapshot>> {
        self.latest.read().clone()
    }

    /// The most recent snapshot if it is newer than `seen`, with its
    /// generation.
    #[must_use]
    pub fn latest_since(&self, seen: u64) -> Option<(u64, Arc<WorldSnapshot>)> {
        let guard = self.latest.read();
        let generation = self.generation.load(Ordering::Acquire);
        if generation <= seen {
            return None;
        }
        guard.clone().map(|snapshot| (generation, snapshot))
    }

    /// Number of snapshots published so far.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drops the published snapshot.
    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::index::IndexerBuilder;
    use crate::world::WorldState;

    fn world() -> WorldState {
        WorldState::with_defaults(Arc::new(IndexerBuilder::new().build()))
    }

    #[test]
    fn test_publish_and_read() {
        let exchange = SnapshotExchange::new();
        assert!(exchange.latest().is_none());

        let mut world = world();
        world.spawn();
        assert_eq!(exchange.publish(world.snapshot()), 1);

        let snapshot = exchange.latest().unwrap();
        assert_eq!(snapshot.entities().alive_count(), 1);
        assert_eq!(exchange.latest_since(1).map(|(g, _)| g), None);
        assert_eq!(exchange.latest_since(0).map(|(g, _)| g), Some(1));
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let exchange = SnapshotExchange::new();
        let mut world = world();
        exchange.publish(world.snapshot());
        let held = exchange.latest().unwrap();

        world.spawn();
        world.advance_tick();
        exchange.publish(world.snapshot());

        assert_eq!(held.tick(), 0);
        assert_eq!(exchange.latest().unwrap().tick(), 1);
    }

    #[test]
    fn test_cross_thread_reader() {
        let exchange = SnapshotExchange::new();
        let mut world = world();
        for _ in 0..3 {
            world.spawn();
        }
        exchange.publish(world.snapshot());

        let reader = Arc::clone(&exchange);
        let alive = thread::spawn(move || reader.latest().map(|s| s.entities().alive_count()))
            .join()
            .unwrap();
        assert_eq!(alive, Some(3));
    }
}
