use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use webstorage_sync::prelude::*;

fn bench_raw_set_item(c: &mut Criterion) {
    let ctx = Context::builder().local_storage(MemoryStorage::new()).build();
    let hook = use_local_storage::<String>(&ctx, "bench", HookOptions::new()).unwrap();

    c.bench_function("WebStorage::set_item raw x1000", |b| {
        b.iter(|| {
            for i in 0..1000 {
                hook.set_item(format!("value-{i}")).unwrap();
            }
            black_box(hook.value())
        })
    });
}

fn bench_json_set_item(c: &mut Criterion) {
    let ctx = Context::builder().local_storage(MemoryStorage::new()).build();
    let hook = use_local_storage::<serde_json::Value>(&ctx, "bench", HookOptions::new().parse(true)).unwrap();

    c.bench_function("WebStorage::set_item json x1000", |b| {
        b.iter(|| {
            for i in 0..1000 {
                hook.set_item(json!({ "n": i, "tags": ["a", "b"] })).unwrap();
            }
            black_box(hook.value())
        })
    });
}

fn bench_fan_out(c: &mut Criterion) {
    let ctx = Context::builder().local_storage(MemoryStorage::new()).build();
    let hooks: Vec<WebStorage<String>> = (0..100)
        .map(|_| use_local_storage(&ctx, "shared", HookOptions::new()).unwrap())
        .collect();
    // listeners on unrelated keys still share the storage topic
    let others: Vec<WebStorage<String>> = (0..100)
        .map(|i| use_local_storage(&ctx, format!("other-{i}"), HookOptions::new()).unwrap())
        .collect();

    c.bench_function("set_item with 100 bindings of the key", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            hooks[0].set_item(i.to_string()).unwrap();
            black_box(hooks[99].value())
        })
    });
    black_box(others.len());
}

fn bench_cross_tab(c: &mut Criterion) {
    let origin = MemoryStorage::new();
    let tabs: Vec<Context> = (0..10)
        .map(|_| Context::builder().shared_local_storage(&origin).build())
        .collect();
    let hooks: Vec<WebStorage<String>> = tabs
        .iter()
        .map(|tab| use_local_storage(tab, "shared", HookOptions::new()).unwrap())
        .collect();

    c.bench_function("set_item across 10 tabs", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            hooks[0].set_item(i.to_string()).unwrap();
            black_box(hooks[9].value())
        })
    });
}

fn bench_activate(c: &mut Criterion) {
    let storage = MemoryStorage::with_entries([("settings", r#"{"volume":7,"muted":false}"#)]);
    let ctx = Context::builder().local_storage(storage).build();

    c.bench_function("use_local_storage json read", |b| {
        b.iter(|| {
            let hook =
                use_local_storage::<serde_json::Value>(&ctx, "settings", HookOptions::new().parse(true)).unwrap();
            black_box(hook.value())
        })
    });
}

criterion_group!(
    benches,
    bench_raw_set_item,
    bench_json_set_item,
    bench_fan_out,
    bench_cross_tab,
    bench_activate,
);
criterion_main!(benches);
