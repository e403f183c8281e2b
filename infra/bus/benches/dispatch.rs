use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::future;
use std::hint::black_box;
use std::sync::Arc;
use tidings_bus::{Bus, Callback, Completion, ConcurrentBus};

#[derive(Debug)]
struct Tick(u64);

fn on_tick(event: Arc<Tick>) -> Completion {
    black_box(event.0);
    Box::pin(future::ready(Ok(())))
}

// ============================================================================
// Benchmark: Subscription Table Maintenance
// ============================================================================

fn bench_subscribe(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscribe");

    for count in [16_i32, 256] {
        group.bench_with_input(BenchmarkId::new("ordered", count), &count, |b, &count| {
            b.iter(|| {
                let mut bus = Bus::new();
                for order in (0..count).rev() {
                    let callback =
                        Callback::<Tick>::from_closure(|_| Box::pin(future::ready(Ok(()))));
                    bus.subscribe_with_order(callback, order).unwrap();
                }
                black_box(bus.subscriber_count::<Tick>());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Publish Fan-Out
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

    for fan_out in [1_usize, 8, 64] {
        let bus = ConcurrentBus::new();
        for _ in 0..fan_out {
            bus.blocking_subscribe(Callback::from_fn(on_tick)).unwrap();
        }

        group.throughput(Throughput::Elements(u64::try_from(fan_out).unwrap_or(u64::MAX)));
        group.bench_with_input(BenchmarkId::new("fan_out", fan_out), &bus, |b, bus| {
            b.to_async(&rt).iter(|| async {
                bus.publish(Tick(7)).await.unwrap();
            });
        });
    }

    group.bench_function("no_subscribers", |b| {
        let bus = ConcurrentBus::new();
        b.to_async(&rt).iter(|| async {
            bus.publish(Tick(0)).await.unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_subscribe, bench_publish);
criterion_main!(benches);
