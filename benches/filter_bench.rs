use std::collections::HashMap;
use std::hint::black_box;

use biblioteca_xonler::config::PaginationConfig;
use biblioteca_xonler::query::{filter::escape_like, Pagination};
use biblioteca_xonler::routes::{libros, prestamos};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn benchmark_loan_filters(c: &mut Criterion) {
    let cases = [
        ("empty", params(&[])),
        ("search", params(&[("q", "cien años de soledad")])),
        (
            "all_fields",
            params(&[
                ("q", "garcía"),
                ("libro_id", "12"),
                ("usuario_id", "7"),
                ("activo", "true"),
                ("fecha_desde", "2024-01-01"),
                ("fecha_hasta", "2024-12-31"),
                ("limit", "50"),
            ]),
        ),
    ];

    let mut group = c.benchmark_group("prestamos_filter");
    for (name, query) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, q| {
            b.iter(|| {
                let filter = prestamos::build_filter(black_box(q)).unwrap();
                black_box(filter.where_clause());
            })
        });
    }
    group.finish();
}

fn benchmark_book_filter(c: &mut Criterion) {
    let query = params(&[("q", "borges"), ("biblioteca_id", "3"), ("disponible", "sí")]);
    c.bench_function("libros_filter", |b| {
        b.iter(|| black_box(libros::build_filter(black_box(&query)).unwrap()))
    });
}

fn benchmark_escape_like(c: &mut Criterion) {
    let term = "50%_de_descuento\\".repeat(64);
    c.bench_function("escape_like_1k", |b| b.iter(|| black_box(escape_like(black_box(&term)))));
}

fn benchmark_pagination(c: &mut Criterion) {
    let cfg = PaginationConfig::default();
    c.bench_function("pagination_clamp", |b| {
        b.iter(|| black_box(Pagination::clamp(black_box(Some("5000")), black_box(Some("-1")), &cfg)))
    });
}

criterion_group!(benches, benchmark_loan_filters, benchmark_book_filter, benchmark_escape_like, benchmark_pagination);
criterion_main!(benches);
