use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use syrx_postgres::prelude::*;
use syrx_postgres::postgres::parse_connection_string;

const CONNECTION_STRINGS: [(&str, &str); 3] = [
    ("npgsql", "Host=localhost;Port=5432;Database=syrx;Username=app;Password='p;w'"),
    ("url", "postgresql://app:pw@localhost:5432/syrx"),
    ("key_value", "host=localhost port=5432 dbname=syrx user=app"),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_connection_string");
    for (name, connection_string) in CONNECTION_STRINGS {
        group.bench_with_input(BenchmarkId::from_parameter(name), connection_string, |b, s| {
            b.iter(|| parse_connection_string(black_box(s)));
        });
    }
    group.finish();
}

fn bench_create_connection(c: &mut Criterion) {
    let settings = CommanderSettingsBuilder::build(|mut b| {
        for (alias, connection_string) in CONNECTION_STRINGS {
            b = b.add_connection_string(alias, connection_string);
        }
        b
    })
    .expect("benchmark settings");
    let connector = PostgresConnector::new(Arc::new(settings), PostgresFactory);

    let mut group = c.benchmark_group("create_connection");
    for (alias, _) in CONNECTION_STRINGS {
        let setting = CommandSetting::new("select 1", alias).expect("benchmark command");
        group.bench_with_input(BenchmarkId::from_parameter(alias), &setting, |b, setting| {
            b.iter(|| connector.create_connection(black_box(setting)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_create_connection);
criterion_main!(benches);
