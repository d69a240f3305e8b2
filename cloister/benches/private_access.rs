//! Run with:
//!   cargo bench --bench private_access

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use cloister::{DefinitionToken, Interpreter, Object, PropertyKey, SlotTable, Value, compile};

const COUNTER: &str = r#"
    class Counter {
        private n = 0;
        bump() { private.n = private.n + 1; }
        merge(other) { private(other)["n"] = private(other)["n"] + private.n; }
    }
    let a = new Counter();
    let b = new Counter();
    let i = 0;
    while (i < 1000) {
        a.bump();
        b.merge(a);
        i = i + 1;
    }
"#;

const FORGED: &str = r#"
    class Vault { private k = 1; peek() { return private.k; } }
    let peek = new Vault().peek;
    let i = 0;
    let rejected = 0;
    while (i < 1000) {
        try { peek.call({ k: i }); } catch (e) { rejected = rejected + 1; }
        i = i + 1;
    }
"#;

fn bench_scripts(c: &mut Criterion) {
    let counter = Arc::new(compile(COUNTER).expect("counter compiles"));
    c.bench_function("script_private_read_write", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            black_box(interp.run_unit(Arc::clone(&counter)).expect("runs"));
        })
    });

    let forged = Arc::new(compile(FORGED).expect("forged compiles"));
    c.bench_function("script_rejected_receiver", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            black_box(interp.run_unit(Arc::clone(&forged)).expect("runs"));
        })
    });
}

fn bench_tables(c: &mut Criterion) {
    let program = parser::parse_program("class A {}").expect("parses");
    let site = program.arena.class_ids().next().expect("one class");

    let table = SlotTable::new();
    let key = PropertyKey::from("n");
    c.bench_function("slot_table_set_get", |b| {
        b.iter(|| {
            table.set(key.clone(), Value::Number(1.0));
            black_box(table.get(black_box(&key)));
        })
    });

    let token = DefinitionToken::new(site, "A");
    let instances: Vec<_> = (0..64)
        .map(|_| {
            let object = Object::new(None);
            token.register_instance(&object);
            object
        })
        .collect();
    c.bench_function("token_lookup_instance", |b| {
        b.iter(|| {
            for object in &instances {
                black_box(token.lookup_instance(black_box(object)).is_ok());
            }
        })
    });

    c.bench_function("token_register_and_release", |b| {
        b.iter(|| {
            let object = Object::new(None);
            black_box(token.register_instance(&object));
        })
    });
}

criterion_group!(benches, bench_scripts, bench_tables);
criterion_main!(benches);
