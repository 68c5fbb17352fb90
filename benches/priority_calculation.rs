//! Priority function benchmarks: raw formula, novelty scan width, and the
//! runtime-weights calculator used by the worker.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use multiverse::adapters::embeddings::HashingEmbeddingProvider;
use multiverse::domain::models::{Evaluation, Node, SchedulerWeights};
use multiverse::services::{compute_priority, PriorityCalculator, SharedWeights};

const DIMENSION: usize = 64;

fn embeddings(n: usize) -> Vec<Vec<f32>> {
    let provider = HashingEmbeddingProvider::new(DIMENSION).unwrap();
    (0..n)
        .map(|i| provider.embed_text(&format!("strategy number {i}: lead with data, keep it short")))
        .collect()
}

fn bench_compute_priority(c: &mut Criterion) {
    let weights = SchedulerWeights::default();
    let embedding = embeddings(1).remove(0);

    let mut group = c.benchmark_group("compute_priority");
    for k in [0_usize, 10, 100] {
        let top_k = embeddings(k);
        group.bench_with_input(BenchmarkId::from_parameter(k), &top_k, |b, top_k| {
            b.iter(|| {
                compute_priority(
                    black_box(Some(0.72)),
                    black_box(Some(0.64)),
                    black_box(&embedding),
                    black_box(3),
                    black_box(top_k),
                    &weights,
                )
            });
        });
    }
    group.finish();
}

fn bench_calculator_with_shared_weights(c: &mut Criterion) {
    let shared = Arc::new(SharedWeights::new(SchedulerWeights::default()));
    let calculator = PriorityCalculator::new(shared);
    let mut all = embeddings(11);
    let child_embedding = all.pop().unwrap_or_default();

    let root = Node::root("root", all[0].clone(), None).with_score(0.5, 1);
    let evaluation = Evaluation {
        score: 0.7,
        samples: vec![],
        sample_count: 3,
        usage: None,
    };
    let child = Node::child(&root, "child", evaluation, child_embedding, None);

    c.bench_function("calculator_shared_weights_top10", |b| {
        b.iter(|| calculator.calculate(black_box(&child), black_box(root.score), black_box(&all)));
    });
}

criterion_group!(benches, bench_compute_priority, bench_calculator_with_shared_weights);
criterion_main!(benches);
