//! Criterion benchmarks for the conscript pipeline.
//!
//! Two groups: `compile` measures the parser alone, `exec` measures repeated
//! evaluation of an already-compiled conscription — the intended usage shape
//! (compile once, test many rows).
//!
//! Run:
//!   cargo bench
//!   cargo bench -- compile   # one group

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use conscript::{compile, ExecOptions, Vars};

const SIMPLE: &str = "month=10 & day=28";
const GROUPED: &str = "(x>0 & x<=y-1) | x=999";
const HIGHER_ORDER: &str = "[1,2,3,4,5].map((x){x*2}).last = 10";
const DEFAULT_LEFT: &str = ">2 & +1=4 & -  1 = 2";

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, src) in [
        ("simple", SIMPLE),
        ("grouped", GROUPED),
        ("higher_order", HIGHER_ORDER),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| compile(black_box(src)).unwrap());
        });
    }
    group.finish();
}

fn bench_exec(c: &mut Criterion) {
    let mut group = c.benchmark_group("exec");

    let simple = compile(SIMPLE).unwrap();
    let simple_vars = Vars::from(json!({"month": 10, "day": 28}));
    group.bench_function("simple", |b| {
        b.iter(|| simple.exec(black_box(simple_vars.clone())).unwrap());
    });

    let grouped = compile(GROUPED).unwrap();
    let grouped_vars = Vars::from(json!({"x": 51, "y": 100}));
    group.bench_function("grouped", |b| {
        b.iter(|| grouped.exec(black_box(grouped_vars.clone())).unwrap());
    });

    let higher = compile(HIGHER_ORDER).unwrap();
    let empty = Vars::empty();
    group.bench_function("higher_order", |b| {
        b.iter(|| higher.exec(black_box(empty.clone())).unwrap());
    });

    let defaulted = compile(DEFAULT_LEFT).unwrap();
    group.bench_function("default_left", |b| {
        b.iter(|| {
            defaulted
                .exec_with(black_box(empty.clone()), ExecOptions::default_left(3.0))
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_exec);
criterion_main!(benches);
