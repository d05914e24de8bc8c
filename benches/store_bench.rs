use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spendlog::{Credentials, LedgerStore, NewRecord, StoreEvent, StoreOptions};
use spendlog_memory::InMemoryDriver;
use tokio::runtime::Runtime;

fn setup(runtime: &Runtime) -> LedgerStore {
    runtime.block_on(async {
        let store = LedgerStore::with_driver(
            Credentials::new("localhost", "bench"),
            StoreOptions::default(),
            Arc::new(InMemoryDriver::new()),
        );
        let mut events = store.subscribe();
        match events.recv().await {
            Ok(StoreEvent::Connect) => {}
            other => panic!("Expected connect, got {:?}", other),
        }
        store
    })
}

fn seed_data(runtime: &Runtime, store: &LedgerStore) {
    runtime.block_on(async {
        // A year of hourly expenses
        for i in 0..(365 * 24) {
            let record = NewRecord {
                account: format!("acc-{}", i % 4),
                amount: (i % 100) as f64,
                currency: "USD".to_string(),
                timestamp: 1_672_531_200 + i * 3600,
                description: format!("Expense {}", i),
                available_credit: 5000.0,
                category: None,
            };
            store.insert_expense(record).await.unwrap();
        }
    });
}

fn bench_range_queries(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let store = setup(&runtime);
    seed_data(&runtime, &store);

    c.bench_function("get_expenses_one_day", |b| {
        b.to_async(&runtime).iter(|| async {
            store
                .get_expenses(black_box(1_680_000_000), black_box(1_680_086_400))
                .await
                .unwrap()
        })
    });

    c.bench_function("get_expenses_one_month", |b| {
        b.to_async(&runtime).iter(|| async {
            store
                .get_expenses(black_box(1_680_000_000), black_box(1_682_592_000))
                .await
                .unwrap()
        })
    });
}

fn bench_insert(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let store = setup(&runtime);

    c.bench_function("insert_expense", |b| {
        b.to_async(&runtime).iter(|| async {
            store
                .insert_expense(NewRecord {
                    account: "acc-1".to_string(),
                    amount: 9.99,
                    currency: "USD".to_string(),
                    timestamp: 1_680_000_000,
                    description: "Coffee".to_string(),
                    available_credit: 5000.0,
                    category: Some("food".to_string()),
                })
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_range_queries, bench_insert);
criterion_main!(benches);
