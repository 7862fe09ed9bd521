//! # World
//!
//! [`WorldState`] owns the arena, the component tables and the tick
//! bookkeeping, and tears them down together.

mod snapshot;
mod state;
mod tick;

pub use snapshot::{TableImage, WorldSnapshot};
pub use state::WorldState;
pub use tick::TickState;
