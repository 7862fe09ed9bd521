//! # TESSERA Caravan Simulation
//!
//! Headless demo of the tick loop:
//! - Caravans spawn with an arena-backed route and travel stop to stop
//! - Finished caravans are despawned through the deferred queue
//! - The world is paused externally for a stretch mid-run
//! - A reader thread rebuilds worlds from published snapshots
//!
//! ```bash
//! # Defaults
//! ./tessera_sim
//!
//! # Custom world config and tick count
//! ./tessera_sim world.toml 2000
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use tessera::core::{
    Component, ComponentSetElement, DestroyContext, Entity, IndexerBuilder, MemList,
    OneShotValue, OptionalValue, StorageKind, WorldConfig, WorldState,
};
use tessera::{System, TickContext, TickLoop, TickLoopConfig};

const DEFAULT_TICKS: u64 = 600;
const SPAWN_EVERY: u64 = 5;
const STOPS_PER_ROUTE: u32 = 6;
const PAUSE_AT: u64 = 200;
const PAUSE_FOR: u64 = 50;

/// Stops to visit, in arena memory.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
struct Route {
    stops: MemList<u32>,
    cursor: u32,
    progress: f32,
}

impl Component for Route {}

/// Goods on board; empty once delivered.
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Cargo {
    load: OptionalValue<u32>,
}

impl Component for Cargo {}

/// Wear picked up this tick, settled in the late phase.
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Wear {
    pending: OneShotValue<f32>,
}

impl Component for Wear {
    const STORAGE: StorageKind = StorageKind::Dense;
}

/// Spawns a caravan every few ticks.
struct Spawner {
    spawned: u32,
}

impl System for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        if ctx.tick % SPAWN_EVERY != 0 {
            return;
        }
        let world = &mut *ctx.world;
        let caravan = world.spawn();
        let seed = self.spawned;

        let mut route = Route::default();
        for stop in 0..STOPS_PER_ROUTE {
            if let Err(err) = route.stops.push(world.allocator_mut(), seed.wrapping_mul(31) ^ stop) {
                println!("[SPAWNER] route allocation failed: {err}");
                route.stops.dispose(world.allocator_mut());
                world.destroy(caravan);
                return;
            }
        }

        let inserted = world.insert(caravan, route).and_then(|_| {
            world.insert(caravan, Cargo { load: OptionalValue::new(100 + seed % 50) })?;
            world.insert(caravan, Wear::default())
        });
        if let Err(err) = inserted {
            println!("[SPAWNER] insert failed: {err}");
            world.destroy(caravan);
            return;
        }
        self.spawned += 1;
    }
}

/// Moves caravans along their routes and retires finished ones.
struct Mover {
    speed: f32,
    arrivals: Vec<Entity>,
    finished: Vec<Entity>,
}

impl System for Mover {
    fn name(&self) -> &str {
        "mover"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let step = self.speed * ctx.delta_time;
        let arrivals = &mut self.arrivals;
        let finished = &mut self.finished;

        ctx.world.for_each_mut::<Route>(|entity, route| {
            route.progress += step;
            if route.progress < 1.0 {
                return;
            }
            route.progress = 0.0;
            route.cursor += 1;
            arrivals.push(entity);
            if route.cursor as usize >= route.stops.len() {
                finished.push(entity);
            }
        });

        for entity in self.arrivals.drain(..) {
            if let Some(wear) = ctx.world.get_mut::<Wear>(entity) {
                wear.pending.accrue(0.5);
            }
        }
        for entity in self.finished.drain(..) {
            if let Some(cargo) = ctx.world.get_mut::<Cargo>(entity) {
                cargo.load.clear();
            }
            ctx.despawn.send(entity);
        }
    }
}

/// Settles wear once per unpaused tick.
#[derive(Default)]
struct Upkeep {
    total_wear: f32,
}

impl System for Upkeep {
    fn name(&self) -> &str {
        "upkeep"
    }

    fn update(&mut self, _ctx: &mut TickContext<'_>) {}

    fn late_update(&mut self, world: &mut WorldState) {
        let mut settled = 0.0;
        world.for_each_mut::<Wear>(|_, wear| settled += wear.pending.take());
        self.total_wear += settled;
    }
}

fn release_route(ctx: &mut DestroyContext<'_>, element: &ComponentSetElement<Route>) {
    let mut stops = element.value.stops;
    stops.dispose(ctx.allocator);
}

fn main() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    TESSERA CARAVAN SIMULATION");
    println!("═══════════════════════════════════════════════════════════════════");

    let mut args = std::env::args().skip(1);
    let world_config = match args.next() {
        Some(path) => match WorldConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("[CONFIG] {path}: {err}");
                std::process::exit(1);
            }
        },
        None => WorldConfig::default(),
    };
    let ticks = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    let indexer = Arc::new(
        IndexerBuilder::new()
            .with_component::<Route>()
            .with_component::<Cargo>()
            .with_component::<Wear>()
            .build(),
    );

    let mut world = WorldState::new(Arc::clone(&indexer), &world_config);
    world.set_destroy_handler::<Route>(release_route);

    let mut tick_loop = TickLoop::new(
        world,
        TickLoopConfig {
            world: world_config,
            publish_every: 10,
            enable_timing_logs: true,
            ..Default::default()
        },
    );
    tick_loop.add_system(Spawner { spawned: 0 });
    tick_loop.add_system(Mover {
        speed: 4.0,
        arrivals: Vec::new(),
        finished: Vec::new(),
    });
    tick_loop.add_system(Upkeep::default());

    // Reader: rebuilds a world from each new snapshot and counts caravans.
    let exchange = tick_loop.exchange();
    let running = Arc::new(AtomicBool::new(true));
    let reader = {
        let running = Arc::clone(&running);
        let indexer = Arc::clone(&indexer);
        thread::spawn(move || {
            let mut seen = 0;
            let mut views = 0u64;
            let mut peak = 0usize;
            while running.load(Ordering::Acquire) {
                let Some((generation, snapshot)) = exchange.latest_since(seen) else {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                };
                seen = generation;
                match WorldState::from_snapshot(&snapshot, Arc::clone(&indexer)) {
                    Ok(view) => {
                        peak = peak.max(view.components::<Route>().len());
                        views += 1;
                    }
                    Err(err) => println!("[READER] snapshot rejected: {err}"),
                }
            }
            (views, peak)
        })
    };

    println!("[SIM] running {ticks} ticks");
    for _ in 0..ticks {
        let tick = tick_loop.world().tick_state().tick();
        if tick == PAUSE_AT {
            tick_loop.world_mut().pause_simulation();
            println!("[SIM] paused at tick {tick}");
        } else if tick == PAUSE_AT + PAUSE_FOR {
            tick_loop.world_mut().resume_simulation();
            println!("[SIM] resumed at tick {tick}");
        }
        tick_loop.tick();
    }

    running.store(false, Ordering::Release);
    let (views, peak) = reader.join().unwrap_or_else(|_| {
        println!("[READER] thread panicked");
        (0, 0)
    });

    println!();
    println!("[SIM] caravans alive: {}", tick_loop.world().alive_count());
    println!("[SIM] snapshots viewed: {views} (peak {peak} caravans)");
    tick_loop.stats().print_summary();

    let remaining: Vec<Entity> = tick_loop.world().entities().iter_alive().collect();
    tick_loop.world_mut().destroy_batch(&remaining);
    let report = tick_loop.dispose();
    println!();
    println!(
        "[SIM] arena {} released {} bytes, {} cells outstanding",
        report.arena_id, report.bytes_released, report.live_cells
    );
}
