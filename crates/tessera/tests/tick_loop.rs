//! # Tick Loop Integration Tests
//!
//! 1. **Pause gating**: update never runs while paused or during the resume
//!    delay; late update runs whenever unpaused
//! 2. **Despawn flush**: queued entities are destroyed as one batch per tick
//! 3. **Publishing**: readers rebuild the world from published snapshots
//!
//! Run with: cargo test -p tessera --test tick_loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tessera::core::{
    Component, ComponentSetElement, DestroyContext, DestroyHandler, Entity, IndexerBuilder,
    Indexer, StorageKind, TickConfig, WorldConfig, WorldState,
};
use tessera::{System, TickContext, TickLoop, TickLoopConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Counter {
    value: u32,
}

impl Component for Counter {
    const STORAGE: StorageKind = StorageKind::Dense;
}

/// Counts handler batches and elements.
#[derive(Clone, Default)]
struct BatchProbe {
    batches: Arc<AtomicUsize>,
    elements: Arc<AtomicUsize>,
}

impl DestroyHandler<Counter> for BatchProbe {
    fn on_destroy(&self, _ctx: &mut DestroyContext<'_>, _element: &ComponentSetElement<Counter>) {
        self.elements.fetch_add(1, Ordering::Relaxed);
    }

    fn on_destroy_dense(&self, ctx: &mut DestroyContext<'_>, elements: &[ComponentSetElement<Counter>]) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        for element in elements {
            self.on_destroy(ctx, element);
        }
    }
}

/// Increments every counter in update, counts late phases.
#[derive(Default)]
struct Bump {
    updates: Arc<AtomicUsize>,
    late_updates: Arc<AtomicUsize>,
}

impl System for Bump {
    fn name(&self) -> &str {
        "bump"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        ctx.world.for_each_mut::<Counter>(|_, counter| counter.value += 1);
    }

    fn late_update(&mut self, _world: &mut WorldState) {
        self.late_updates.fetch_add(1, Ordering::Relaxed);
    }
}

fn indexer() -> Arc<Indexer> {
    Arc::new(IndexerBuilder::new().with_component::<Counter>().build())
}

fn tick_loop(resume_delay_ticks: u32) -> TickLoop {
    let config = TickLoopConfig {
        world: WorldConfig {
            tick: TickConfig {
                resume_delay_ticks,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    };
    let world = WorldState::new(indexer(), &config.world);
    TickLoop::new(world, config)
}

fn spawn_counters(tick_loop: &mut TickLoop, count: usize) -> Vec<Entity> {
    let world = tick_loop.world_mut();
    (0..count)
        .map(|_| {
            let entity = world.spawn();
            world.insert(entity, Counter::default()).unwrap();
            entity
        })
        .collect()
}

// ============================================================================
// PROPERTY 1: PAUSE GATING
// ============================================================================

#[test]
fn paused_and_delayed_ticks_skip_update() {
    let mut tick_loop = tick_loop(2);
    let entity = spawn_counters(&mut tick_loop, 1)[0];
    let bump = Bump::default();
    let (updates, late_updates) = (Arc::clone(&bump.updates), Arc::clone(&bump.late_updates));
    tick_loop.add_system(bump);

    tick_loop.run(3);
    assert_eq!(updates.load(Ordering::Relaxed), 3);
    assert_eq!(late_updates.load(Ordering::Relaxed), 3);

    // Two holders pause; one resume is not enough.
    tick_loop.world_mut().pause_simulation();
    tick_loop.world_mut().pause_simulation();
    tick_loop.run(4);
    tick_loop.world_mut().resume_simulation();
    tick_loop.run(4);
    assert_eq!(updates.load(Ordering::Relaxed), 3);
    assert_eq!(late_updates.load(Ordering::Relaxed), 3);

    // Last resume starts the two-tick delay: late phase only.
    tick_loop.world_mut().resume_simulation();
    tick_loop.run(2);
    assert_eq!(updates.load(Ordering::Relaxed), 3);
    assert_eq!(late_updates.load(Ordering::Relaxed), 5);

    tick_loop.run(1);
    assert_eq!(updates.load(Ordering::Relaxed), 4);
    assert_eq!(tick_loop.world().get::<Counter>(entity), Some(&Counter { value: 4 }));

    // Paused ticks are still counted.
    assert_eq!(tick_loop.world().tick_state().tick(), 14);
    assert_eq!(tick_loop.stats().ticks_updated, 4);
}

// ============================================================================
// PROPERTY 2: DESPAWN FLUSH
// ============================================================================

#[test]
fn despawns_flush_as_one_batch() {
    let mut tick_loop = tick_loop(0);
    let probe = BatchProbe::default();
    tick_loop.world_mut().set_destroy_handler::<Counter>(probe.clone());
    let entities = spawn_counters(&mut tick_loop, 8);

    let doomed: Vec<Entity> = entities.iter().copied().step_by(2).collect();
    let mut pending = doomed.clone();
    // Duplicate and stale requests are tolerated.
    pending.push(doomed[0]);
    tick_loop.add_fn_system("reaper", move |ctx| {
        for entity in pending.drain(..) {
            assert!(ctx.despawn.send(entity));
        }
    });

    let stats = tick_loop.tick();
    assert_eq!(stats.despawned, 4);
    assert_eq!(probe.batches.load(Ordering::Relaxed), 1);
    assert_eq!(probe.elements.load(Ordering::Relaxed), 4);
    assert_eq!(tick_loop.world().alive_count(), 4);
    for entity in &doomed {
        assert!(!tick_loop.world().is_alive(*entity));
    }

    let stats = tick_loop.tick();
    assert_eq!(stats.despawned, 0);
    assert_eq!(probe.batches.load(Ordering::Relaxed), 1);
}

#[test]
fn despawns_requested_while_paused_wait_for_resume() {
    let mut tick_loop = tick_loop(0);
    let entities = spawn_counters(&mut tick_loop, 3);
    let sender = tick_loop.despawn_sender();

    tick_loop.world_mut().pause_simulation();
    std::thread::spawn(move || {
        for entity in entities {
            assert!(sender.send_blocking(entity));
        }
    })
    .join()
    .unwrap();

    tick_loop.run(3);
    assert_eq!(tick_loop.pending_despawns(), 3);
    assert_eq!(tick_loop.world().alive_count(), 3);

    tick_loop.world_mut().resume_simulation();
    let stats = tick_loop.tick();
    assert_eq!(stats.despawned, 3);
    assert_eq!(tick_loop.world().alive_count(), 0);
}

#[test]
fn paused_requests_beyond_queue_capacity_are_kept() {
    let config = TickLoopConfig {
        despawn_capacity: 2,
        ..Default::default()
    };
    let world = WorldState::new(indexer(), &config.world);
    let mut tick_loop = TickLoop::new(world, config);
    let entities = spawn_counters(&mut tick_loop, 6);
    let sender = tick_loop.despawn_sender();

    tick_loop.world_mut().pause_simulation();
    for pair in entities.chunks(2) {
        for &entity in pair {
            assert!(sender.send(entity));
        }
        tick_loop.tick();
    }
    assert_eq!(tick_loop.pending_despawns(), 6);
    assert_eq!(tick_loop.world().alive_count(), 6);

    tick_loop.world_mut().resume_simulation();
    let stats = tick_loop.tick();
    assert_eq!(stats.despawned, 6);
    assert_eq!(tick_loop.pending_despawns(), 0);
    assert_eq!(tick_loop.world().alive_count(), 0);
}

// ============================================================================
// PROPERTY 3: PUBLISHING
// ============================================================================

#[test]
fn readers_rebuild_published_state() {
    let mut tick_loop = tick_loop(0);
    let entities = spawn_counters(&mut tick_loop, 5);
    tick_loop.add_system(Bump::default());
    let exchange = tick_loop.exchange();
    let indexer = Arc::clone(tick_loop.world().indexer());

    tick_loop.run(10);
    assert_eq!(exchange.generation(), 10);

    let published = Arc::clone(&exchange);
    let reader = std::thread::spawn(move || {
        let (generation, snapshot) = exchange.latest_since(0).unwrap();
        let view = WorldState::from_snapshot(&snapshot, indexer).unwrap();
        let values: Vec<u32> = entities
            .iter()
            .map(|&entity| view.get::<Counter>(entity).map_or(0, |c| c.value))
            .collect();
        (generation, snapshot.tick(), values)
    });
    let (generation, tick, values) = reader.join().unwrap();
    assert_eq!(generation, 10);
    assert_eq!(tick, 10);
    assert_eq!(values, vec![10; 5]);

    let arena = tick_loop.world().allocator().id();
    let report = tick_loop.dispose();
    assert_eq!(report.arena_id, arena);
    assert!(published.latest().is_none(), "dispose clears the exchange");
}
