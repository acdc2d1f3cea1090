use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use deadline_timer::{DeadlineQueue, Pool};

// ==================== Pool ====================

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");

    group.bench_function("allocate_deallocate", |b| {
        let mut pool: Pool<u64> = Pool::with_capacity(1024);

        b.iter(|| {
            let key = pool.allocate(black_box(42)).unwrap();
            black_box(pool.deallocate(key))
        });
    });

    group.bench_function("allocate_full", |b| {
        let mut pool: Pool<u64> = Pool::with_capacity(1);
        pool.allocate(0).unwrap();

        b.iter(|| black_box(pool.allocate(black_box(1)).is_err()));
    });

    group.finish();
}

// ==================== Queue ====================

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");

    for size in [64u32, 4096, 65536] {
        group.bench_with_input(BenchmarkId::new("push_pop", size), &size, |b, &size| {
            let mut queue: DeadlineQueue<()> = DeadlineQueue::with_capacity(size + 1);
            for id in 0..size as u64 {
                queue.push(id, (id * 7919) % 100_000, ()).unwrap();
            }
            let mut next_id = size as u64;

            b.iter(|| {
                next_id += 1;
                queue.push(next_id, (next_id * 7919) % 100_000, ()).unwrap();
                black_box(queue.pop())
            });
        });

        group.bench_with_input(BenchmarkId::new("remove_by_id", size), &size, |b, &size| {
            let mut queue: DeadlineQueue<()> = DeadlineQueue::with_capacity(size);
            for id in 0..size as u64 {
                queue.push(id, (id * 7919) % 100_000, ()).unwrap();
            }
            let mut cursor = 0u64;

            b.iter(|| {
                let id = cursor % size as u64;
                let entry = queue.remove(id).unwrap();
                queue.push(entry.id, entry.deadline_ns, ()).unwrap();
                cursor += 1;
                black_box(entry.id)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pool, bench_queue);
criterion_main!(benches);
