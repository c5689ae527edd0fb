//! Benchmarks for graph algorithms.

use converge_netflow::graph::{calc_max_flow, spf, EdgeAttrs, EdgeSelect, Graph, MaxFlowOptions};
use converge_netflow::types::{FlowPlacement, NodeId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn random_graph(nodes: usize, edges: usize, seed: u64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = Graph::new();

    let ids: Vec<NodeId> = (0..nodes)
        .map(|i| {
            let id = NodeId::from(format!("n{i}"));
            graph.add_node(id.clone()).unwrap();
            id
        })
        .collect();

    for _ in 0..edges {
        let from = rng.gen_range(0..nodes);
        let to = rng.gen_range(0..nodes);
        if from != to {
            let cost = rng.gen_range(1..100) as f64;
            let capacity = rng.gen_range(1..50) as f64;
            let _ = graph.add_edge(
                ids[from].clone(),
                ids[to].clone(),
                EdgeAttrs::new(cost, capacity),
                None,
            );
        }
    }

    graph
}

fn bench_spf(c: &mut Criterion) {
    let mut group = c.benchmark_group("spf");

    for (nodes, edges) in [(100, 500), (500, 2500), (1000, 5000)] {
        let graph = random_graph(nodes, edges, 42);
        let source = NodeId::from("n0");

        group.bench_with_input(BenchmarkId::new("nodes", nodes), &graph, |b, g| {
            b.iter(|| {
                spf(
                    black_box(g),
                    &source,
                    &EdgeSelect::AllMinCost,
                    true,
                    &HashSet::new(),
                    &HashSet::new(),
                    None,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_max_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("max_flow");

    for (nodes, edges) in [(100, 500), (500, 2500), (1000, 5000)] {
        let graph = random_graph(nodes, edges, 7);
        let source = NodeId::from("n0");
        let sink = NodeId::from(format!("n{}", nodes - 1));

        let options = MaxFlowOptions {
            flow_placement: FlowPlacement::Proportional,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("nodes", nodes), &graph, |b, g| {
            b.iter(|| {
                let mut working = g.clone();
                calc_max_flow(black_box(&mut working), &source, &sink, &options).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spf, bench_max_flow);
criterion_main!(benches);
