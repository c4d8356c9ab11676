//! Criterion benchmarks for the per-interaction paths.
//!
//! Every pan, zoom or click re-runs the aggregation over the visible
//! features and redraws the map, so these need to stay well under a frame.
//!
//! Run with: cargo bench --bench hot_paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;

use covid_map::config::Settings;
use covid_map::data::{Dataset, Feature};
use covid_map::map::{ChoroplethMap, ColorScale, Viewport};
use covid_map::stats::{dedup_by_name, histogram, total_cases, Brackets};

const DATE: &str = "2022-06-06";

/// A grid of square "states" over the continental US, every fourth one
/// split into two polygons the way island states are.
fn synthetic_dataset() -> Dataset {
    let mut features = Vec::new();
    for row in 0..10 {
        for col in 0..25 {
            let lon = -125.0 + col as f64 * 2.4;
            let lat = 25.0 + row as f64 * 2.4;
            let square = |dx: f64| {
                vec![vec![
                    (lon + dx, lat),
                    (lon + dx + 1.0, lat),
                    (lon + dx + 1.0, lat + 2.0),
                    (lon + dx, lat + 2.0),
                    (lon + dx, lat),
                ]]
            };
            let idx = row * 25 + col;
            let mut polygons = vec![square(0.0)];
            if idx % 4 == 0 {
                polygons.push(square(1.2));
            }
            features.push(Feature {
                name: format!("State {}", idx % 50),
                cases_by_date: BTreeMap::from([(DATE.to_string(), idx as i64 * 25_000)]),
                polygons,
            });
        }
    }
    Dataset::new(features)
}

// ---------------------------------------------------------------------------
// Benchmark: aggregation
// ---------------------------------------------------------------------------

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    let dataset = synthetic_dataset();
    let brackets = Brackets::default();

    group.bench_function("total_cases", |b| {
        b.iter(|| black_box(total_cases(black_box(dataset.features()), DATE)));
    });

    group.bench_function("histogram", |b| {
        b.iter(|| black_box(histogram(black_box(dataset.features()), &brackets, DATE)));
    });

    group.bench_function("dedup_by_name", |b| {
        b.iter(|| black_box(dedup_by_name(black_box(dataset.features()))));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: map picking and drawing
// ---------------------------------------------------------------------------

fn bench_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");
    let dataset = synthetic_dataset();
    let map = ChoroplethMap::new(&dataset, &ColorScale::default(), DATE);
    let viewport = Viewport::home(&Settings::default().home, 240, 160);

    group.bench_function("feature_at", |b| {
        b.iter(|| black_box(map.feature_at(&dataset, black_box(-98.5), black_box(39.5))));
    });

    group.bench_function("rendered_features", |b| {
        b.iter(|| black_box(map.rendered_features(&dataset, black_box(&viewport))));
    });

    group.bench_function("render", |b| {
        b.iter(|| black_box(map.render(&dataset, 120, 40, black_box(&viewport))));
    });

    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_map);
criterion_main!(benches);
