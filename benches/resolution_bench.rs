//! Resolution performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use krylay::*;

fn build_list(rows: usize) -> (LayoutTree, NodeId, Vec<NodeId>) {
    let mut tree = LayoutTree::new(LayoutOptions::default());
    let root = tree.create_node(
        NodeSpec::new("View")
            .constant("gap", 8.0)
            .attribute("width", "100%")
            .attribute("height", "100%"),
    );
    let mut cells = Vec::with_capacity(rows);
    for i in 0..rows {
        let cell = tree.create_node(
            NodeSpec::new("Label")
                .state("count", i as f64)
                .attribute("text", "Row {count}")
                .attribute("left", "gap")
                .attribute("right", "gap")
                .attribute("top", "previous.top + previous.height + gap")
                .attribute("height", "44"),
        );
        tree.add_child(root, cell).unwrap();
        cells.push(cell);
    }
    (tree, root, cells)
}

fn bench_compile_expression(c: &mut Criterion) {
    let (mut tree, _root, cells) = build_list(4);
    let cell = cells[1];
    c.bench_function("compile_and_resolve", |b| {
        b.iter(|| {
            tree.set_expression(cell, "width", black_box("parent.width > 320 ? (parent.width - gap * 2) / 3 : 50%"))
                .unwrap();
            tree.resolve(cell, "width").unwrap()
        })
    });
}

fn bench_full_pass(c: &mut Criterion) {
    c.bench_function("full_pass_200_rows", |b| {
        b.iter_with_setup(|| build_list(200), |(mut tree, _, _)| black_box(tree.update()))
    });
}

fn bench_incremental_update(c: &mut Criterion) {
    let (mut tree, _root, cells) = build_list(200);
    tree.update();
    let mut count = 0.0;
    c.bench_function("set_state_then_update", |b| {
        b.iter(|| {
            count += 1.0;
            tree.set_state(cells[0], "count", count).unwrap();
            black_box(tree.update_if_needed())
        })
    });
}

fn bench_cached_resolve(c: &mut Criterion) {
    let (mut tree, _root, cells) = build_list(200);
    let last = cells[cells.len() - 1];
    tree.resolve(last, "top").unwrap();
    c.bench_function("cached_resolve_last_row", |b| {
        b.iter(|| tree.resolve(black_box(last), "top").unwrap())
    });
}

criterion_group!(
    benches,
    bench_compile_expression,
    bench_full_pass,
    bench_incremental_update,
    bench_cached_resolve
);
criterion_main!(benches);
