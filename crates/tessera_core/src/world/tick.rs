//! # Tick & Pause Bookkeeping
//!
//! ```text
//!            pause()                       resume() → 0
//! Running ───────────▶ Paused (count > 0) ───────────▶ Resuming (delay > 0)
//!    ▲                                                      │
//!    └──────────────── advance() burns the delay ───────────┘
//! ```
//!
//! Pauses nest: every `pause` needs a matching `resume`. Systems gate on
//! [`TickState::can_update`]; late-update systems (presentation, bookkeeping)
//! gate on [`TickState::can_late_update`], which ignores the resume delay.

use serde::{Deserialize, Serialize};

use crate::config::{OverResumePolicy, TickConfig};

/// Tick scalars and the pause counter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickState {
    game_speed: f32,
    tick_duration: f32,
    resume_delay_ticks: u32,
    resume_countdown: u32,
    pause_count: i32,
    tick: u64,
    over_resume: OverResumePolicy,
}

impl Default for TickState {
    fn default() -> Self {
        Self::from_config(&TickConfig::default())
    }
}

impl TickState {
    /// Running state at tick 0.
    #[must_use]
    pub fn from_config(config: &TickConfig) -> Self {
        Self {
            game_speed: config.game_speed,
            tick_duration: config.tick_duration_secs,
            resume_delay_ticks: config.resume_delay_ticks,
            resume_countdown: 0,
            pause_count: 0,
            tick: 0,
            over_resume: config.over_resume,
        }
    }

    /// Adds one pause. Returns the new counter value.
    pub fn pause(&mut self) -> i32 {
        self.pause_count = self.pause_count.saturating_add(1);
        self.pause_count
    }

    /// Removes one pause. Returns the new counter value.
    ///
    /// When the counter reaches zero the resume delay starts.
    ///
    /// # Panics
    ///
    /// Panics on an unmatched resume if the policy is
    /// [`OverResumePolicy::Panic`].
    pub fn resume(&mut self) -> i32 {
        if self.pause_count <= 0 {
            match self.over_resume {
                OverResumePolicy::Clamp => {
                    tracing::warn!(tick = self.tick, "resume without a matching pause, ignored");
                    self.pause_count = 0;
                    return 0;
                }
                OverResumePolicy::Panic => {
                    panic!("resume without a matching pause at tick {}", self.tick)
                }
            }
        }
        self.pause_count -= 1;
        if self.pause_count == 0 {
            self.resume_countdown = self.resume_delay_ticks;
        }
        self.pause_count
    }

    /// Current pause counter. Never negative.
    #[inline]
    #[must_use]
    pub const fn pause_count(&self) -> i32 {
        self.pause_count
    }

    /// True while at least one pause is held.
    #[inline]
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.pause_count > 0
    }

    /// Not paused, resume delay elapsed, and time is moving.
    #[inline]
    #[must_use]
    pub fn can_update(&self) -> bool {
        !self.is_paused() && self.resume_countdown == 0 && self.game_speed > 0.0
    }

    /// Not paused.
    #[inline]
    #[must_use]
    pub const fn can_late_update(&self) -> bool {
        !self.is_paused()
    }

    /// Counts one tick and burns down the resume delay.
    ///
    /// Returns the scaled delta time if simulation systems should run this
    /// tick, `None` otherwise. Paused ticks are still counted.
    pub fn advance(&mut self) -> Option<f32> {
        self.tick += 1;
        if self.is_paused() {
            return None;
        }
        if self.resume_countdown > 0 {
            self.resume_countdown -= 1;
            return None;
        }
        self.can_update().then(|| self.scaled_delta())
    }

    /// Ticks counted so far.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time per tick at the current speed.
    #[inline]
    #[must_use]
    pub fn scaled_delta(&self) -> f32 {
        self.tick_duration * self.game_speed
    }

    /// Speed multiplier.
    #[inline]
    #[must_use]
    pub const fn game_speed(&self) -> f32 {
        self.game_speed
    }

    /// Sets the speed multiplier. Zero freezes updates without pausing.
    pub fn set_game_speed(&mut self, speed: f32) {
        debug_assert!(speed.is_finite() && speed >= 0.0, "invalid game speed {speed}");
        self.game_speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
    }

    /// Seconds per tick at speed 1.
    #[inline]
    #[must_use]
    pub const fn tick_duration(&self) -> f32 {
        self.tick_duration
    }

    /// Sets seconds per tick.
    pub fn set_tick_duration(&mut self, seconds: f32) {
        debug_assert!(seconds.is_finite() && seconds > 0.0, "invalid tick duration {seconds}");
        self.tick_duration = seconds;
    }

    /// Ticks to wait after the last resume.
    #[inline]
    #[must_use]
    pub const fn resume_delay_ticks(&self) -> u32 {
        self.resume_delay_ticks
    }

    /// Sets the resume delay; applies from the next resume.
    pub fn set_resume_delay_ticks(&mut self, ticks: u32) {
        self.resume_delay_ticks = ticks;
    }

    /// Ticks left before updates run again.
    #[inline]
    #[must_use]
    pub const fn resume_countdown(&self) -> u32 {
        self.resume_countdown
    }

    /// What an unmatched resume does.
    #[inline]
    #[must_use]
    pub const fn over_resume(&self) -> OverResumePolicy {
        self.over_resume
    }
}
