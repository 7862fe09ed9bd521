//! # Deferred Despawn Queue
//!
//! Systems that decide an entity must go do not destroy it mid-update.
//! They push it here, and the tick loop flushes the queue into one
//! `destroy_batch` after the update phase, so every destroy handler sees a
//! single batch per tick.
//!
//! ```text
//! System A ──┐
//! System B ──┼──▶ bounded channel ──▶ drain() ──▶ world.destroy_batch(..)
//! Thread X ──┘
//! ```

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tessera_core::Entity;

/// Owner of the despawn channel; held by the tick loop.
pub struct DespawnQueue {
    sender: Sender<Entity>,
    receiver: Receiver<Entity>,
}

impl DespawnQueue {
    /// Creates a queue holding at most `capacity` pending entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> DespawnSender {
        DespawnSender {
            sender: self.sender.clone(),
        }
    }

    /// Takes every pending entity.
    pub fn drain(&self) -> Vec<Entity> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending entities.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Handle for requesting despawns.
#[derive(Clone)]
pub struct DespawnSender {
    sender: Sender<Entity>,
}

impl DespawnSender {
    /// Queues `entity` (non-blocking).
    ///
    /// Returns `false` if the queue is full or the loop is gone; the request
    /// is dropped.
    #[inline]
    pub fn send(&self, entity: Entity) -> bool {
        match self.sender.try_send(entity) {
            Ok(()) => true,
            Err(TrySendError::Full(entity)) => {
                tracing::warn!(?entity, "despawn queue full, request dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queues `entity`, waiting for room if the queue is full.
    #[inline]
    pub fn send_blocking(&self, entity: Entity) -> bool {
        self.sender.send(entity).is_ok()
    }
}
