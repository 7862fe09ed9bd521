//! # World Lifecycle Tests
//!
//! 1. **Cascading cleanup**: destroying an entity releases every nested cell
//!    exactly once
//! 2. **Same-tick churn**: zeroed components destroyed before any writes
//! 3. **Pause orchestration** through the world
//! 4. **Dispatch**: delegate calls stored in components
//! 5. **Snapshots** restored against a differently ordered registry
//!
//! Run with: cargo test -p tessera_core --test world_lifecycle

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tessera_core::{
    Component, ComponentSetElement, DelegateCall, DestroyContext, DestroyHandler, Entity,
    IndexerBuilder, Indexer, MemList, MemPtr, OneShotValue, OptionalValue, OverResumePolicy, Proxy,
    StorageKind, TickConfig, WorldConfig, WorldState,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Links to other nodes; every entry is a separately allocated cell.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
struct Links {
    children: MemList<MemPtr>,
    parents: MemList<MemPtr>,
}

impl Component for Links {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Health {
    current: u32,
}

impl Component for Health {
    const STORAGE: StorageKind = StorageKind::Dense;
}

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Ledger {
    balance: OptionalValue<i64>,
    debt: OneShotValue<i64>,
}

impl Component for Ledger {}

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Schedule {
    next: DelegateCall,
}

impl Component for Schedule {}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct HealOrder {
    target: Entity,
    amount: u32,
    _pad: u32,
}

struct Heal;

impl Proxy for Heal {
    const NAME: &'static str = "heal";

    fn invoke(world: &mut WorldState, payload: MemPtr) {
        let order = *world.allocator().get::<HealOrder>(payload);
        if let Some(health) = world.get_mut::<Health>(order.target) {
            health.current += order.amount;
        }
    }
}

struct ReleaseLinks;

impl ReleaseLinks {
    fn release(ctx: &mut DestroyContext<'_>, list: MemList<MemPtr>) {
        let mut list = list;
        let cells: Vec<MemPtr> = list.iter(ctx.allocator).collect();
        for cell in cells {
            ctx.allocator.free(cell);
        }
        list.dispose(ctx.allocator);
    }
}

impl DestroyHandler<Links> for ReleaseLinks {
    fn on_destroy(&self, ctx: &mut DestroyContext<'_>, element: &ComponentSetElement<Links>) {
        Self::release(ctx, element.value.children);
        Self::release(ctx, element.value.parents);
    }
}

fn indexer() -> IndexerBuilder {
    let mut builder = IndexerBuilder::new();
    builder.register_component::<Links>();
    builder.register_component::<Health>();
    builder.register_component::<Ledger>();
    builder.register_component::<Schedule>();
    builder.register_type::<HealOrder>();
    builder.register_proxy::<Heal>();
    builder
}

fn world() -> WorldState {
    let mut world = WorldState::with_defaults(Arc::new(indexer().build()));
    world.set_destroy_handler::<Links>(ReleaseLinks);
    world
}

fn push_cells(world: &mut WorldState, entity: Entity, children: usize, parents: usize) {
    world
        .update::<Links, _>(entity, |arena, links| {
            for i in 0..children {
                let cell = arena.alloc_value(i as u64).unwrap();
                links.children.push(arena, cell).unwrap();
            }
            for i in 0..parents {
                let cell = arena.alloc_value(i as u64).unwrap();
                links.parents.push(arena, cell).unwrap();
            }
        })
        .unwrap();
}

// ============================================================================
// PROPERTY 1: CASCADING CLEANUP
// ============================================================================

#[test]
fn destroy_releases_n_plus_m_plus_two_cells() {
    for (n, m) in [(0, 0), (1, 0), (3, 5), (17, 2)] {
        let mut world = world();
        let entity = world.spawn();
        world.insert(entity, Links::default()).unwrap();
        push_cells(&mut world, entity, n, m);

        let lists = usize::from(n > 0) + usize::from(m > 0);
        let live_before = world.allocator().live_count();
        let free_before = world.allocator().free_cell_count();

        assert!(world.destroy(entity));
        assert_eq!(world.allocator().free_cell_count(), free_before + n + m + lists);
        assert_eq!(world.allocator().live_count(), live_before - n - m - lists);
    }
}

#[test]
fn destroy_with_both_lists_frees_exactly_n_plus_m_plus_two() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Links::default()).unwrap();
    push_cells(&mut world, entity, 6, 4);
    let before = world.allocator().free_cell_count();

    world.destroy(entity);
    assert_eq!(world.allocator().free_cell_count(), before + 6 + 4 + 2);
}

#[test]
fn double_destroy_is_safe() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Links::default()).unwrap();
    push_cells(&mut world, entity, 2, 2);

    assert!(world.destroy(entity));
    let after_first = world.allocator().free_cell_count();
    assert!(!world.destroy(entity));
    assert_eq!(world.destroy_batch(&[entity, entity]), 0);
    assert_eq!(world.allocator().free_cell_count(), after_first, "no double free");
}

#[test]
fn batch_destroy_handles_many_owners() {
    let mut world = world();
    let entities: Vec<Entity> = (0..50)
        .map(|_| {
            let entity = world.spawn();
            world.insert(entity, Links::default()).unwrap();
            world.insert(entity, Health { current: 1 }).unwrap();
            entity
        })
        .collect();
    for &entity in &entities {
        push_cells(&mut world, entity, 1, 1);
    }
    let table_cells = 3 + 2;
    assert_eq!(world.allocator().live_count(), table_cells + 50 * 4);

    assert_eq!(world.destroy_batch(&entities), 50);
    assert_eq!(world.allocator().live_count(), table_cells);
    assert_eq!(world.components::<Links>().len(), 0);
    assert_eq!(world.components::<Health>().len(), 0);
}

#[test]
fn remove_component_runs_handler() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Links::default()).unwrap();
    push_cells(&mut world, entity, 3, 0);
    let live = world.allocator().live_count();

    assert!(world.remove::<Links>(entity));
    assert_eq!(world.allocator().live_count(), live - 4);
    assert!(world.is_alive(entity), "entity survives component removal");
}

// ============================================================================
// PROPERTY 2: SAME-TICK CHURN
// ============================================================================

#[test]
fn zeroed_component_destroyed_same_tick() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Links::default()).unwrap();
    let live = world.allocator().live_count();
    let free = world.allocator().free_cell_count();

    assert!(world.destroy(entity));
    assert_eq!(world.allocator().live_count(), live);
    assert_eq!(world.allocator().free_cell_count(), free);
}

#[test]
fn one_shot_debt_is_applied_once() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Ledger::default()).unwrap();

    world.update::<Ledger, _>(entity, |_, ledger| {
        ledger.balance.set(100);
        ledger.debt.accrue(30);
        ledger.debt.accrue(5);
    });

    for _ in 0..3 {
        world.update::<Ledger, _>(entity, |_, ledger| {
            let debt = ledger.debt.take();
            ledger.balance.set(ledger.balance.get_value() - debt);
        });
    }
    let ledger = world.get::<Ledger>(entity).unwrap();
    assert_eq!(ledger.balance.try_get_value(), Some(65));
    assert!(!ledger.debt.is_pending());
}

// ============================================================================
// PROPERTY 3: PAUSE ORCHESTRATION
// ============================================================================

#[test]
fn pause_resume_symmetry_through_world() {
    let mut world = world();
    for depth in 1..=4 {
        assert_eq!(world.pause_simulation(), depth);
    }
    assert!(world.is_paused());
    assert!(world.advance_tick().is_none());
    for depth in (0..4).rev() {
        assert_eq!(world.resume_simulation(), depth);
    }
    assert!(world.can_update());

    assert_eq!(world.resume_simulation(), 0, "over-resume clamps");
    assert_eq!(world.tick_state().pause_count(), 0);
    assert!(world.can_update());
}

#[test]
fn resume_delay_from_config() {
    let config = WorldConfig {
        tick: TickConfig {
            resume_delay_ticks: 3,
            over_resume: OverResumePolicy::Clamp,
            ..TickConfig::default()
        },
        ..WorldConfig::default()
    };
    let mut world = WorldState::new(Arc::new(indexer().build()), &config);

    world.pause_simulation();
    world.resume_simulation();
    let ran: Vec<bool> = (0..5).map(|_| world.advance_tick().is_some()).collect();
    assert_eq!(ran, vec![false, false, false, true, true]);
    assert_eq!(world.tick_state().tick(), 5);
}

// ============================================================================
// PROPERTY 4: DISPATCH
// ============================================================================

#[test]
fn delegate_call_stored_in_component() {
    let mut world = world();
    let patient = world.spawn();
    world.insert(patient, Health { current: 10 }).unwrap();

    let order = world
        .allocator_mut()
        .alloc_value(HealOrder {
            target: patient,
            amount: 5,
            _pad: 0,
        })
        .unwrap();
    let call = world.indexer().call::<Heal>(order);
    let medic = world.spawn();
    world.insert(medic, Schedule { next: call }).unwrap();

    let next = world.get::<Schedule>(medic).unwrap().next;
    world.invoke(next);
    world.invoke(next);
    assert_eq!(world.get::<Health>(patient).unwrap().current, 20);
}

// ============================================================================
// PROPERTY 5: SNAPSHOTS
// ============================================================================

#[test]
fn snapshot_restores_into_reordered_registry() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Health { current: 42 }).unwrap();
    world.insert(entity, Links::default()).unwrap();
    push_cells(&mut world, entity, 2, 1);
    let order = world
        .allocator_mut()
        .alloc_value(HealOrder {
            target: entity,
            amount: 1,
            _pad: 0,
        })
        .unwrap();
    let call = world.indexer().call::<Heal>(order);
    world.insert(entity, Schedule { next: call }).unwrap();
    world.advance_tick();
    let snapshot = world.snapshot();

    // A later build registers things in a different order.
    let mut builder = IndexerBuilder::new();
    builder.register_delegate("unrelated", |_, _| {});
    builder.register_proxy::<Heal>();
    builder.register_type::<HealOrder>();
    builder.register_component::<Schedule>();
    builder.register_component::<Ledger>();
    builder.register_component::<Health>();
    builder.register_component::<Links>();
    let live: Arc<Indexer> = Arc::new(builder.build());

    let mut restored = WorldState::from_snapshot(&snapshot, Arc::clone(&live)).unwrap();
    restored.set_destroy_handler::<Links>(ReleaseLinks);
    assert_eq!(restored.tick_state().tick(), 1);
    assert_eq!(restored.get::<Health>(entity).unwrap().current, 42);

    let saved = restored.get::<Schedule>(entity).unwrap().next;
    let call = snapshot.remap().resolve_call(saved, &live).unwrap();
    assert_ne!(call.delegate, saved.delegate);
    restored.invoke(call);
    assert_eq!(restored.get::<Health>(entity).unwrap().current, 43);

    let before = restored.allocator().free_cell_count();
    restored.destroy(entity);
    assert_eq!(restored.allocator().free_cell_count(), before + 2 + 1 + 2);
}

#[test]
fn dispose_reports_outstanding_cells() {
    let mut world = world();
    let entity = world.spawn();
    world.insert(entity, Links::default()).unwrap();
    push_cells(&mut world, entity, 4, 0);
    let live = world.allocator().live_count();

    let report = world.dispose();
    assert_eq!(report.live_cells, live);
}
