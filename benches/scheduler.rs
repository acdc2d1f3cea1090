use criterion::{Criterion, criterion_group, criterion_main};
use hdrhistogram::Histogram;
use std::hint::black_box;
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use deadline_timer::{
    Clock, DeadlineScheduler, DispatchMode, ManualClock, MonotonicClock, RunnerConfig,
    SchedulerConfig,
};

const LATENCY_TIMERS: u64 = 2_000;

// ==================== Schedule / Cancel ====================

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule");

    group.bench_function("schedule_cancel_locked", |b| {
        let scheduler = DeadlineScheduler::new(SchedulerConfig::default().with_capacity(1024));

        b.iter(|| {
            let handle = scheduler
                .schedule_ns(1_000_000, DispatchMode::Inline, || {})
                .unwrap();
            black_box(scheduler.cancel(handle.id()))
        });
    });

    group.bench_function("schedule_cancel_exclusive", |b| {
        let mut scheduler = DeadlineScheduler::new(SchedulerConfig::default().with_capacity(1024));
        let mut exclusive = scheduler.exclusive().unwrap();

        b.iter(|| {
            let handle = exclusive
                .schedule_ns(1_000_000, DispatchMode::Inline, || {})
                .unwrap();
            black_box(exclusive.cancel(handle.id()))
        });
    });

    group.finish();
}

// ==================== Fire ====================

fn bench_fire(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire");

    group.bench_function("fire_due_batch_256", |b| {
        b.iter_custom(|iters| {
            let clock = ManualClock::new(0);
            let scheduler = DeadlineScheduler::with_clock(
                SchedulerConfig::default().with_capacity(256),
                clock.clone(),
            );
            let mut elapsed = Duration::ZERO;

            for round in 0..iters {
                let base = round * 1_000;
                clock.set(base);
                for i in 0..256u64 {
                    scheduler
                        .schedule_ns(i % 997, DispatchMode::Inline, || {})
                        .unwrap();
                }

                let start = Instant::now();
                black_box(scheduler.fire_due(base + 1_000));
                elapsed += start.elapsed();
            }

            elapsed
        });
    });

    group.finish();
}

// ==================== Firing Lateness ====================

/// Runner-driven lateness: how far past its deadline each timer fired.
fn bench_lateness(c: &mut Criterion) {
    let mut group = c.benchmark_group("lateness");
    group.sample_size(10);

    group.bench_function("runner_1ms_spread", |b| {
        b.iter_custom(|iters| {
            let clock = Arc::new(MonotonicClock::new());
            let scheduler = DeadlineScheduler::with_clock(
                SchedulerConfig::default()
                    .with_capacity(LATENCY_TIMERS as u32)
                    .with_check_interval(Duration::from_millis(1)),
                Arc::clone(&clock),
            );
            let _runner = scheduler.start(RunnerConfig::default()).unwrap();
            let hist = Arc::new(Mutex::new(Histogram::<u64>::new(3).unwrap()));
            let start = Instant::now();

            for _ in 0..iters {
                let (tx, rx) = mpsc::channel();
                for i in 0..LATENCY_TIMERS {
                    let clock_in_task = Arc::clone(&clock);
                    let hist = Arc::clone(&hist);
                    let tx = tx.clone();
                    // Lower bound on the deadline the scheduler will assign.
                    let due = clock.now_ns().unwrap_or(0) + i * 1_000;

                    scheduler
                        .schedule_ns(i * 1_000, DispatchMode::Inline, move || {
                            let now = clock_in_task.now_ns().unwrap_or(due);
                            let _ = hist.lock().unwrap().record(now.saturating_sub(due));
                            let _ = tx.send(());
                        })
                        .unwrap();
                }
                drop(tx);
                while rx.recv().is_ok() {}
            }

            let hist = hist.lock().unwrap();
            println!(
                "lateness ns: p50={} p99={} p999={} max={}",
                hist.value_at_quantile(0.50),
                hist.value_at_quantile(0.99),
                hist.value_at_quantile(0.999),
                hist.max()
            );
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_schedule, bench_fire, bench_lateness);
criterion_main!(benches);
