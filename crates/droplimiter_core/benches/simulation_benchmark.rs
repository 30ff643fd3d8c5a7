//! Benchmark for the drop simulation engine.
//!
//! TARGET: a week of per-minute trials across 100 drops in well under a second
//!
//! Run with: cargo bench --package droplimiter_core --bench simulation_benchmark

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use droplimiter_core::{trial_schedule, DropRate, DropTable, InventoryView, Ledger, SeededTrials, SimulationEngine};

const NOW: i64 = 1_718_000_000;
const WEEK: i64 = 7 * 86_400;

fn create_test_table(drops: u32) -> DropTable {
    let mut text = String::from("pool common 500\npool rare 20\n");
    for item in 0..drops {
        let line = match item % 4 {
            0 => format!("drop Common {item}: {item} 5%/min pool common\n"),
            1 => format!("drop Limited {item}: {item} 10%/hour limit 3/day\n"),
            2 => format!("drop Rare {item}: {item} 1%/day limit 1/week pool rare,common\n"),
            _ => format!("drop Plain {item}: {item} 0.5%/5min\n"),
        };
        text.push_str(&line);
    }
    DropTable::parse(&text).expect("benchmark table parses")
}

fn benchmark_schedule(c: &mut Criterion) {
    let rate = DropRate::parse("5%/min").expect("rate parses");

    c.bench_function("trial_schedule_week", |b| {
        b.iter(|| black_box(trial_schedule(black_box(604_800), &rate)).trial_count());
    });
}

fn benchmark_week_of_minutes(c: &mut Criterion) {
    let table = create_test_table(100);

    let mut group = c.benchmark_group("week_simulation");
    group.throughput(Throughput::Elements(table.len() as u64));
    group.sample_size(10);

    group.bench_function("100_drops_1_week", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            let mut ledger = Ledger::new(NOW - WEEK);
            let mut inventory = InventoryView::new();
            black_box(
                SimulationEngine::new(SeededTrials::from_seed_u64(seed))
                    .run(&table, &mut ledger, &mut inventory, NOW),
            )
        });
    });

    group.finish();
}

fn benchmark_frequent_runs(c: &mut Criterion) {
    let table = create_test_table(100);

    c.bench_function("100_drops_1_minute", |b| {
        let mut trials = SeededTrials::from_seed_u64(7);
        b.iter(|| {
            let mut ledger = Ledger::new(NOW - 60);
            let mut inventory = InventoryView::new();
            let summary = SimulationEngine::new(&mut trials).run(&table, &mut ledger, &mut inventory, NOW);
            black_box(summary.total_drops())
        });
    });
}

criterion_group!(
    benches,
    benchmark_schedule,
    benchmark_week_of_minutes,
    benchmark_frequent_runs
);
criterion_main!(benches);
