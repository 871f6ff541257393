use criterion::{black_box, criterion_group, criterion_main, Criterion};
use meetpoint::graph::{Direction, Edge, Graph, Mode};
use meetpoint::routing::{dijkstra_with_penalty, CHANGE_PENALTY_MINUTES};

/// A synthetic grid of hubs, two lines weaving through it, so the
/// search actually pays the line-change penalty on some walks.
fn synthetic_graph(hubs_per_line: usize) -> Graph {
    let mut g = Graph::new();
    for i in 0..hubs_per_line {
        g.add_hub(meetpoint::graph::Hub {
            id: format!("H{i}"),
            name: format!("Hub {i}"),
            lat: 51.5 + i as f64 * 0.001,
            lon: -0.1 + i as f64 * 0.001,
            zone: None,
            modes: vec![Mode::Tube],
            lines: vec!["L1".to_string(), "L2".to_string()],
            constituent_stations: vec![],
            primary_naptan_id: format!("H{i}"),
        });
    }
    for i in 0..hubs_per_line - 1 {
        let line = if i % 3 == 0 { "L2" } else { "L1" };
        g.upsert_edge(Edge {
            source: format!("H{i}"),
            target: format!("H{}", i + 1),
            key: line.to_string(),
            line: line.to_string(),
            line_name: line.to_string(),
            mode: Mode::Tube,
            direction: Direction::Outbound,
            branch: None,
            transfer: false,
            weight: Some(2.0),
        });
    }
    g
}

fn bench_dijkstra_penalty(c: &mut Criterion) {
    let graph = synthetic_graph(500);
    let source = graph.node_index("H0").unwrap();
    let target = graph.node_index("H499").unwrap();

    c.bench_function("dijkstra_with_penalty_cost_only", |b| {
        b.iter(|| {
            dijkstra_with_penalty(
                black_box(&graph),
                black_box(source),
                black_box(target),
                black_box(CHANGE_PENALTY_MINUTES),
                false,
            )
        });
    });

    c.bench_function("dijkstra_with_penalty_with_path", |b| {
        b.iter(|| {
            dijkstra_with_penalty(
                black_box(&graph),
                black_box(source),
                black_box(target),
                black_box(CHANGE_PENALTY_MINUTES),
                true,
            )
        });
    });
}

criterion_group!(benches, bench_dijkstra_penalty);
criterion_main!(benches);
