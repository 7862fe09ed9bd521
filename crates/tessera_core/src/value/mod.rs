//! # Plain-Byte Value Wrappers
//!
//! `Option`-like cells that stay `Pod`, so components using them can live in
//! the arena.

mod one_shot;
mod optional;

pub use one_shot::OneShotValue;
pub use optional::OptionalValue;
