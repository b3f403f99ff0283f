#![allow(missing_docs)]

use std::fmt::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stratalog::parser::{parse_program, parse_query};
use stratalog::Dataset;

fn program_source(nodes: usize) -> String {
    let mut source = String::new();
    for i in 0..nodes {
        for j in 1..=3 {
            let next = (i + j) % nodes;
            writeln!(source, "edge(node_{i}, node_{next}).").unwrap();
        }
    }
    source.push_str("path(X, Y) :- edge(X, Y).\n");
    source.push_str("path(X, Z) :- path(X, Y), edge(Y, Z).\n");
    source
}

fn setup_graph() -> Dataset {
    parse_program(&program_source(60)).unwrap()
}

fn parse_large_program(c: &mut Criterion) {
    let source = program_source(500);

    c.bench_function("parse_program", |b| {
        b.iter(|| black_box(parse_program(&source).unwrap()));
    });
}

fn query_specific_paths(c: &mut Criterion) {
    let dataset = setup_graph();
    let query = parse_query("path(node_0, X)").unwrap();

    c.bench_function("query_specific_paths", |b| {
        b.iter(|| black_box(dataset.query(&query).unwrap().count()));
    });
}

fn query_existence_check(c: &mut Criterion) {
    let dataset = setup_graph();
    let query = parse_query("path(node_0, node_30)?").unwrap();

    c.bench_function("query_existence_check", |b| {
        b.iter(|| black_box(dataset.ask(&query).unwrap()));
    });
}

criterion_group!(
    benches,
    parse_large_program,
    query_specific_paths,
    query_existence_check
);
criterion_main!(benches);
