//! # TESSERA
//!
//! Tick driver over [`tessera_core`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          TickLoop                            │
//! │                                                              │
//! │  systems ──update──▶ WorldState ◀──destroy_batch── despawn   │
//! │                          │                          queue    │
//! │                     snapshot()                        ▲      │
//! │                          ▼                            │      │
//! │                  SnapshotExchange              DespawnSender │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            ▼
//!                      reader threads
//! ```
//!
//! ## Modules
//!
//! - `despawn`: deferred, batched entity destruction
//! - `tick_loop`: pause-gated update phases and snapshot publishing

pub mod despawn;
pub mod tick_loop;

pub use tessera_core as core;

pub use despawn::{DespawnQueue, DespawnSender};
pub use tick_loop::{
    FnSystem, System, TickContext, TickLoop, TickLoopConfig, TickStats, TickStatsAccumulator,
    MAX_TICK_TIME,
};
