//! # TESSERA Tick Loop
//!
//! One tick over one world:
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. ADVANCE                                                          │
//! │    └─ Count the tick, burn down the resume delay                    │
//! │                                                                     │
//! │ 2. UPDATE (only if can_update)                                      │
//! │    └─ Every system in registration order, scaled delta time         │
//! │                                                                     │
//! │ 3. LATE UPDATE (only if not paused)                                 │
//! │    ├─ Every system's late phase                                     │
//! │    └─ Flush the despawn queue as one destroy batch                  │
//! │    (paused: drain the queue and hold the requests)                  │
//! │                                                                     │
//! │ 4. PUBLISH (every `publish_every` ticks)                            │
//! │    └─ world.snapshot() into the exchange for readers                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_core::{DisposeReport, Entity, SnapshotExchange, WorldConfig, WorldState};

use crate::despawn::{DespawnQueue, DespawnSender};

/// Tick time above which a warning is logged.
pub const MAX_TICK_TIME: Duration = Duration::from_millis(16);

/// Configuration for the tick loop.
#[derive(Clone, Debug)]
pub struct TickLoopConfig {
    /// World sizing and tick scalars.
    pub world: WorldConfig,
    /// Despawn requests the channel holds between two ticks. A request sent
    /// to a full channel is dropped. While paused the loop still empties the
    /// channel every tick and keeps the requests until resume.
    pub despawn_capacity: usize,
    /// Publish a snapshot every N ticks. Zero disables publishing.
    pub publish_every: u64,
    /// Log ticks that exceed [`MAX_TICK_TIME`].
    pub enable_timing_logs: bool,
}

impl Default for TickLoopConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            despawn_capacity: 4096,
            publish_every: 1,
            enable_timing_logs: false,
        }
    }
}

/// Timing and outcome of one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Tick number after advancing.
    pub tick: u64,
    /// Whole tick in microseconds.
    pub total_us: u64,
    /// Update phase in microseconds.
    pub update_us: u64,
    /// Late-update phase in microseconds.
    pub late_update_us: u64,
    /// Despawn flush in microseconds.
    pub despawn_us: u64,
    /// Snapshot publish in microseconds.
    pub publish_us: u64,
    /// Whether the update phase ran.
    pub updated: bool,
    /// Entities destroyed by the despawn flush.
    pub despawned: u32,
}

/// What a system sees during the update phase.
pub struct TickContext<'a> {
    /// The world, mutably.
    pub world: &'a mut WorldState,
    /// Queue for deferred destruction.
    pub despawn: &'a DespawnSender,
    /// Current tick number.
    pub tick: u64,
    /// Simulated seconds this tick (already scaled by game speed).
    pub delta_time: f32,
}

/// A unit of simulation logic.
pub trait System: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs while the world can update.
    fn update(&mut self, ctx: &mut TickContext<'_>);

    /// Runs on every unpaused tick, including resume-delay ticks.
    fn late_update(&mut self, _world: &mut WorldState) {}
}

/// Adapts a closure into a [`System`] with no late phase.
pub struct FnSystem<F> {
    name: String,
    run: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    /// Wraps `run` under `name`.
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        (self.run)(ctx);
    }
}

/// Drives a [`WorldState`] tick by tick.
///
/// Owns the world, the systems and the despawn queue. Readers on other
/// threads observe the world only through the [`SnapshotExchange`].
pub struct TickLoop {
    world: WorldState,
    systems: Vec<Box<dyn System>>,
    despawn: DespawnQueue,
    despawn_sender: DespawnSender,
    /// Requests drained while paused, destroyed on the next flush.
    deferred: Vec<Entity>,
    exchange: Arc<SnapshotExchange>,
    config: TickLoopConfig,
    stats: TickStatsAccumulator,
    was_paused: bool,
}

impl TickLoop {
    /// Wraps an existing world.
    #[must_use]
    pub fn new(world: WorldState, config: TickLoopConfig) -> Self {
        let despawn = DespawnQueue::new(config.despawn_capacity.max(1));
        let despawn_sender = despawn.sender();
        let was_paused = world.is_paused();
        Self {
            world,
            systems: Vec::new(),
            despawn,
            despawn_sender,
            deferred: Vec::new(),
            exchange: SnapshotExchange::new(),
            config,
            stats: TickStatsAccumulator::new(),
            was_paused,
        }
    }

    /// Appends a system; systems run in registration order.
    pub fn add_system(&mut self, system: impl System + 'static) {
        tracing::debug!(system = system.name(), "system added");
        self.systems.push(Box::new(system));
    }

    /// Appends a closure as a system.
    pub fn add_fn_system<F>(&mut self, name: impl Into<String>, run: F)
    where
        F: FnMut(&mut TickContext<'_>) + Send + 'static,
    {
        self.add_system(FnSystem::new(name, run));
    }

    /// Runs one tick.
    pub fn tick(&mut self) -> TickStats {
        let start = Instant::now();

        let paused = self.world.is_paused();
        if paused != self.was_paused {
            if paused {
                tracing::info!(tick = self.world.tick_state().tick(), "simulation paused");
            } else {
                tracing::info!(tick = self.world.tick_state().tick(), "simulation resumed");
            }
            self.was_paused = paused;
        }

        let mut stats = TickStats::default();

        if let Some(delta_time) = self.world.advance_tick() {
            let phase = Instant::now();
            let tick = self.world.tick_state().tick();
            let mut ctx = TickContext {
                world: &mut self.world,
                despawn: &self.despawn_sender,
                tick,
                delta_time,
            };
            for system in &mut self.systems {
                system.update(&mut ctx);
            }
            stats.updated = true;
            stats.update_us = elapsed_us(phase);
        }
        stats.tick = self.world.tick_state().tick();

        if self.world.can_late_update() {
            let phase = Instant::now();
            for system in &mut self.systems {
                system.late_update(&mut self.world);
            }
            stats.late_update_us = elapsed_us(phase);

            let phase = Instant::now();
            stats.despawned = self.flush_despawns();
            stats.despawn_us = elapsed_us(phase);
        } else {
            self.deferred.extend(self.despawn.drain());
        }

        if self.config.publish_every > 0 && stats.tick % self.config.publish_every == 0 {
            let phase = Instant::now();
            let generation = self.exchange.publish(self.world.snapshot());
            tracing::trace!(tick = stats.tick, generation, "snapshot published");
            stats.publish_us = elapsed_us(phase);
        }

        stats.total_us = elapsed_us(start);
        self.stats.record(stats);

        if self.config.enable_timing_logs && stats.total_us > duration_us(MAX_TICK_TIME) {
            tracing::warn!(
                tick = stats.tick,
                total_ms = stats.total_us as f64 / 1000.0,
                budget_ms = duration_us(MAX_TICK_TIME) as f64 / 1000.0,
                "tick exceeded budget"
            );
        }

        stats
    }

    /// Runs `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn flush_despawns(&mut self) -> u32 {
        let mut pending = std::mem::take(&mut self.deferred);
        pending.extend(self.despawn.drain());
        if pending.is_empty() {
            self.deferred = pending;
            return 0;
        }
        let destroyed = self.world.destroy_batch(&pending);
        tracing::debug!(requested = pending.len(), destroyed, "despawn queue flushed");
        pending.clear();
        self.deferred = pending;
        u32::try_from(destroyed).unwrap_or(u32::MAX)
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// The world, mutably (setup and external pause/resume).
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// A sender for deferred despawns, usable from any thread.
    #[must_use]
    pub fn despawn_sender(&self) -> DespawnSender {
        self.despawn.sender()
    }

    /// Despawn requests not yet flushed.
    #[must_use]
    pub fn pending_despawns(&self) -> usize {
        self.despawn.pending_count() + self.deferred.len()
    }

    /// The snapshot exchange readers subscribe to.
    #[must_use]
    pub fn exchange(&self) -> Arc<SnapshotExchange> {
        Arc::clone(&self.exchange)
    }

    /// Accumulated tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStatsAccumulator {
        &self.stats
    }

    /// Tears down the world and reports leaked cells.
    #[must_use]
    pub fn dispose(self) -> DisposeReport {
        self.exchange.clear();
        self.world.dispose()
    }
}

fn elapsed_us(since: Instant) -> u64 {
    duration_us(since.elapsed())
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Accumulator for tick statistics.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Total ticks recorded.
    pub ticks_recorded: u64,
    /// Ticks where the update phase ran.
    pub ticks_updated: u64,
    /// Sum of total tick times.
    pub total_us_sum: u64,
    /// Sum of update phase times.
    pub update_us_sum: u64,
    /// Sum of late-update phase times.
    pub late_update_us_sum: u64,
    /// Sum of despawn flush times.
    pub despawn_us_sum: u64,
    /// Sum of publish times.
    pub publish_us_sum: u64,
    /// Entities destroyed through the despawn queue.
    pub despawned: u64,
    /// Min tick time.
    pub min_tick_us: u64,
    /// Max tick time.
    pub max_tick_us: u64,
    /// Ticks that exceeded [`MAX_TICK_TIME`].
    pub ticks_over_budget: u64,
}

impl TickStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks_recorded: 0,
            ticks_updated: 0,
            total_us_sum: 0,
            update_us_sum: 0,
            late_update_us_sum: 0,
            despawn_us_sum: 0,
            publish_us_sum: 0,
            despawned: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            ticks_over_budget: 0,
        }
    }

    /// Records a tick's statistics.
    pub fn record(&mut self, stats: TickStats) {
        self.ticks_recorded += 1;
        self.ticks_updated += u64::from(stats.updated);
        self.total_us_sum += stats.total_us;
        self.update_us_sum += stats.update_us;
        self.late_update_us_sum += stats.late_update_us;
        self.despawn_us_sum += stats.despawn_us;
        self.publish_us_sum += stats.publish_us;
        self.despawned += u64::from(stats.despawned);
        self.min_tick_us = self.min_tick_us.min(stats.total_us);
        self.max_tick_us = self.max_tick_us.max(stats.total_us);

        if stats.total_us > duration_us(MAX_TICK_TIME) {
            self.ticks_over_budget += 1;
        }
    }

    /// Returns average tick time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        self.avg_ms(self.total_us_sum)
    }

    /// Returns the fraction of ticks over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.ticks_over_budget as f64 / self.ticks_recorded as f64
    }

    fn avg_ms(&self, sum_us: u64) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.ticks_recorded as f64) / 1000.0
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        let min_ms = if self.ticks_recorded == 0 {
            0.0
        } else {
            self.min_tick_us as f64 / 1000.0
        };
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                     TICK STATISTICS SUMMARY                      ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ───────────────────────────────────────────────────────┐");
        println!("│ Ticks Recorded:     {}", self.ticks_recorded);
        println!("│ Ticks Updated:      {}", self.ticks_updated);
        println!("│ Average Tick:       {:.3} ms", self.avg_tick_ms());
        println!("│ Min Tick:           {min_ms:.3} ms");
        println!("│ Max Tick:           {:.3} ms", self.max_tick_us as f64 / 1000.0);
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ BUDGET ───────────────────────────────────────────────────────┐");
        println!("│ Budget:             {:.3} ms", duration_us(MAX_TICK_TIME) as f64 / 1000.0);
        println!(
            "│ Over Budget:        {} ticks ({:.1}%)",
            self.ticks_over_budget,
            self.over_budget_ratio() * 100.0
        );
        println!("└──────────────────────────────────────────────────────────────────┘");

        if self.ticks_recorded > 0 {
            println!();
            println!("┌─ BREAKDOWN ─────────────────────────────────────────────────────┐");
            println!("│ Update:             {:.3} ms", self.avg_ms(self.update_us_sum));
            println!("│ Late Update:        {:.3} ms", self.avg_ms(self.late_update_us_sum));
            println!("│ Despawn Flush:      {:.3} ms ({} entities)", self.avg_ms(self.despawn_us_sum), self.despawned);
            println!("│ Publish:            {:.3} ms", self.avg_ms(self.publish_us_sum));
            println!("└──────────────────────────────────────────────────────────────────┘");
        }
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
