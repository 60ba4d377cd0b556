//! Inspector benchmarks
//!
//! Measures tree reloads and property listings against the simulated HAL.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use halscope_core::{list_properties, ObjectTree};
use halscope_hal::scope;
use halscope_hal::sim::SimulatedHal;

fn benchmark_tree_reload(c: &mut Criterion) {
    let hal = SimulatedHal::demo();
    let mut tree = ObjectTree::load(&hal);

    c.bench_function("tree_reload", |b| {
        b.iter(|| {
            tree.reload(black_box(&hal));
        })
    });
}

fn benchmark_property_listing(c: &mut Criterion) {
    let hal = SimulatedHal::demo();
    let mut group = c.benchmark_group("property_listing");

    // System, device, stream, level control, selector control
    for object in [1u32, 40, 41, 50, 52].iter() {
        group.bench_function(format!("object_{}", object), |b| {
            b.iter(|| list_properties(&hal, black_box(*object), scope::ANY, true))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_tree_reload, benchmark_property_listing);
criterion_main!(benches);
