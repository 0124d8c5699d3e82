// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
// criterion_group!/criterion_main! expand to undocumented functions that cannot
// carry #[allow] (attributes on macro invocations are ignored). Crate-level
// suppress is required for benchmark binaries using Criterion.
#![allow(missing_docs)]
//! Benchmark: state-space exploration
//!
//! `n` independent switches (`A`), each of which may turn into `B` once.
//! Interchangeable switches collapse to `n + 1` states, so the cost is
//! dominated by matching, reaction and canonical keys of every successor.
//! Runs serial and with a fixed worker pool.
use std::sync::Arc;
use std::time::Duration;

use bigraph_core::{
    Bigraph, BigraphBuilder, ModelChecker, ModelCheckingOptions, Parent, ReactionRule,
    ReactiveSystem, Signature,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

fn signature() -> Arc<Signature> {
    Signature::builder()
        .active("A", 0)
        .active("B", 0)
        .build()
        .expect("bench signature")
}

fn with_site(sig: &Arc<Signature>, control: &str) -> Bigraph {
    let mut b = BigraphBuilder::new(Arc::clone(sig));
    let r = b.root();
    let n = b.node(r, control).expect("node");
    b.site(Parent::Node(n)).expect("site");
    b.build().expect("rule side")
}

fn system(sig: &Arc<Signature>, n: usize) -> ReactiveSystem {
    let mut b = BigraphBuilder::new(Arc::clone(sig));
    let r = b.root();
    for _ in 0..n {
        b.node(r, "A").expect("switch");
    }
    let mut sys = ReactiveSystem::new(b.build().expect("agent")).expect("ground agent");
    let rule = ReactionRule::builder(with_site(sig, "A"), with_site(sig, "B"))
        .label("switch")
        .build()
        .expect("rule");
    sys.add_rule(rule).expect("compatible rule");
    sys
}

fn bench_exploration(c: &mut Criterion) {
    let sig = signature();
    let mut group = c.benchmark_group("exploration");
    group
        .sample_size(20)
        .measurement_time(Duration::from_secs(8));
    for &n in &[4usize, 16, 32] {
        group.throughput(Throughput::Elements(n as u64 + 1));
        for (name, options) in [
            ("serial", ModelCheckingOptions::default()),
            (
                "workers_4",
                ModelCheckingOptions::default().with_parallelism(Some(4)),
            ),
        ] {
            let options = options.with_max_transitions(usize::MAX).with_measure_time(false);
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, &n| {
                b.iter_batched(
                    || {
                        ModelChecker::new(system(&sig, n), options.clone())
                            .expect("valid options")
                    },
                    |mut checker| criterion::black_box(checker.explore().stats.states),
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_exploration);
criterion_main!(benches);
