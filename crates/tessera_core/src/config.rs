//! # World Configuration
//!
//! Loaded once at startup from TOML. Every section has a default so a
//! partial file (or none at all) is valid.
//!
//! ```toml
//! [arena]
//! initial_bytes = 65536
//! max_bytes = 268435456
//!
//! [tick]
//! game_speed = 1.0
//! tick_duration_secs = 0.05
//! resume_delay_ticks = 0
//! over_resume = "clamp"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for a [`WorldState`](crate::WorldState).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Arena sizing.
    pub arena: ArenaConfig,
    /// Tick scalars and pause policy.
    pub tick: TickConfig,
}

/// Arena sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Bytes committed when the arena is created.
    pub initial_bytes: usize,
    /// Hard limit; allocations beyond it fail with `OutOfMemory`.
    pub max_bytes: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_bytes: 64 * 1024,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// What `resume_simulation` does when nothing is paused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverResumePolicy {
    /// Keep the counter at zero and log a warning.
    #[default]
    Clamp,
    /// Treat it as a programming error and panic.
    Panic,
}

/// Tick scalars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickConfig {
    /// Multiplier applied to the tick duration. Zero freezes updates.
    pub game_speed: f32,
    /// Simulated seconds per tick at speed 1.0.
    pub tick_duration_secs: f32,
    /// Ticks to wait after the last resume before updates run again.
    pub resume_delay_ticks: u32,
    /// Over-resume policy.
    pub over_resume: OverResumePolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            game_speed: 1.0,
            tick_duration_secs: 0.05,
            resume_delay_ticks: 0,
            over_resume: OverResumePolicy::Clamp,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for inconsistent values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// the errors of [`WorldConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena.max_bytes == 0 {
            return Err(ConfigError::Invalid("arena.max_bytes must be non-zero".into()));
        }
        if self.arena.initial_bytes > self.arena.max_bytes {
            return Err(ConfigError::Invalid(format!(
                "arena.initial_bytes ({}) exceeds arena.max_bytes ({})",
                self.arena.initial_bytes, self.arena.max_bytes
            )));
        }
        if !self.tick.game_speed.is_finite() || self.tick.game_speed < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tick.game_speed must be finite and >= 0, got {}",
                self.tick.game_speed
            )));
        }
        if !self.tick.tick_duration_secs.is_finite() || self.tick.tick_duration_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tick.tick_duration_secs must be finite and > 0, got {}",
                self.tick.tick_duration_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = WorldConfig::from_toml_str(
            r#"
            [tick]
            game_speed = 2.0
            over_resume = "panic"
            "#,
        )
        .unwrap();
        assert!((config.tick.game_speed - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.tick.over_resume, OverResumePolicy::Panic);
        assert_eq!(config.arena, ArenaConfig::default());
    }

    #[test]
    fn test_rejects_inverted_arena_limits() {
        let err = WorldConfig::from_toml_str(
            r"
            [arena]
            initial_bytes = 4096
            max_bytes = 1024
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = WorldConfig::from_toml_str("[tick]\nspeed = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_zero_tick_duration() {
        let err = WorldConfig::from_toml_str("[tick]\ntick_duration_secs = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
