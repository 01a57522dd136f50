use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use database::Database;
use table::FieldType;
use tempfile::tempdir;

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_400_rows", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().expect("tempdir");
                let db = Database::create("", &dir.path().join("db"), "bench", "")
                    .expect("create db");
                let mut table = db.create_table("rows").expect("create table");
                table
                    .add_field("ID", FieldType::Integer, true, true, "")
                    .expect("add field");
                (dir, table)
            },
            |(_dir, mut table)| {
                for i in 1..=400 {
                    table.insert_record();
                    table.field_mut("ID").expect("field").set_integer(i);
                    table.post_record().expect("post");
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_walk(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    let db = Database::create("", &dir.path().join("db"), "bench", "").expect("create db");
    let mut table = db.create_table("walk").expect("create table");
    table
        .add_field("ID", FieldType::Integer, true, true, "")
        .expect("add field");
    for i in 1..=400 {
        table.insert_record();
        table.field_mut("ID").expect("field").set_integer(i);
        table.post_record().expect("post");
    }

    c.bench_function("walk_400_rows", |b| {
        b.iter(|| {
            let mut total = 0i64;
            table.first_record("").expect("first");
            while !table.eof() {
                total += table.field("ID").expect("field").integer_value().expect("int");
                table.next_record("").expect("next");
            }
            assert_eq!(total, (1..=400).sum::<i64>());
        });
    });
}

criterion_group!(benches, bench_insert, bench_walk);
criterion_main!(benches);
