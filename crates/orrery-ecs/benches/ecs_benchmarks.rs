//! ECS hot-path benchmarks.
//!
//! - Entity creation plus component attach, which reclassifies against every
//!   system on each call.
//! - Middle-of-store detach (swap-remove) under a full system roster.
//! - A member-set walk that mutates one component per entity.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use orrery_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component and system types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f64,
    dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Mass(f64);

struct Integrate;

impl System for Integrate {
    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let members: Vec<Entity> = ctx.entities().collect();
        for e in members {
            let (dx, dy) = match ctx.get::<Velocity>(e) {
                Ok(v) => (v.dx, v.dy),
                Err(_) => continue,
            };
            if let Ok(p) = ctx.get_mut::<Position>(e) {
                p.x += dx;
                p.y += dy;
            }
        }
    }
}

struct Gravity;

impl System for Gravity {
    fn update(&mut self, _ctx: &mut SystemContext<'_>) {}
}

struct Census;

impl System for Census {
    fn update(&mut self, _ctx: &mut SystemContext<'_>) {}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup_world() -> World {
    let mut world = World::new();
    world
        .register_components::<(Position, Velocity, Mass)>()
        .unwrap();
    world.register_system(Integrate).unwrap();
    world
        .set_system_required_components::<Integrate, (Position, Velocity)>()
        .unwrap();
    world.register_system(Gravity).unwrap();
    world
        .set_system_required_components::<Gravity, (Position, Mass)>()
        .unwrap();
    world.register_system(Census).unwrap();
    world
}

fn populate(world: &mut World, count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            let e = world.create_entity();
            world
                .add_component(e, Position { x: i as f64, y: 0.0 })
                .unwrap();
            world.add_component(e, Velocity { dx: 1.0, dy: 0.5 }).unwrap();
            if i % 2 == 0 {
                world.add_component(e, Mass(1.0)).unwrap();
            }
            e
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_create_and_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_and_attach");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = setup_world();
                let entities = populate(&mut world, count);
                black_box(entities.len());
            });
        });
    }
    group.finish();
}

fn bench_detach_swap_remove(c: &mut Criterion) {
    c.bench_function("detach_reattach_10k", |b| {
        let mut world = setup_world();
        let entities = populate(&mut world, 10_000);
        b.iter(|| {
            for e in entities.iter().step_by(7) {
                let v = world.remove_component::<Velocity>(*e).unwrap();
                world.add_component(*e, v).unwrap();
            }
            black_box(world.system_members::<Integrate>().unwrap().len());
        });
    });
}

fn bench_system_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_run");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut world = setup_world();
            populate(&mut world, count);
            b.iter(|| {
                let report = world.run_system::<Integrate>().unwrap();
                black_box(report.applied);
            });
        });
    }
    group.finish();
}

fn bench_destroy_cascade(c: &mut Criterion) {
    c.bench_function("destroy_recreate_10k", |b| {
        let mut world = setup_world();
        let mut entities = populate(&mut world, 10_000);
        b.iter(|| {
            for slot in entities.iter_mut().step_by(11) {
                world.destroy_entity(*slot).unwrap();
                let e = world.create_entity();
                world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
                world.add_component(e, Velocity { dx: 0.0, dy: 0.0 }).unwrap();
                *slot = e;
            }
            black_box(world.entity_count());
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_create_and_attach,
    bench_detach_swap_remove,
    bench_system_run,
    bench_destroy_cascade,
);
criterion_main!(benches);
