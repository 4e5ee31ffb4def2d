use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use strand::fibers;
use strand::{Channel, ExecutionContext};

const ITEMS: usize = 10_000;

fn bench_thread_fiber_enqueue(c: &mut Criterion) {
  let mut group = c.benchmark_group("thread_fiber");
  group.throughput(Throughput::Elements(ITEMS as u64));

  group.bench_function("enqueue_drain", |b| {
    b.iter_with_setup(
      || {
        let fiber = fibers::thread();
        fiber.start();
        (fiber, Arc::new(AtomicUsize::new(0)))
      },
      |(fiber, count)| {
        for _ in 0..ITEMS {
          let count = count.clone();
          fiber.enqueue(Box::new(move || {
            count.fetch_add(1, Ordering::Relaxed);
          }));
        }
        while count.load(Ordering::Relaxed) < ITEMS {
          thread::yield_now();
        }
        fiber.dispose();
        fiber.join();
      },
    )
  });

  group.finish();
}

fn bench_channel_publish(c: &mut Criterion) {
  let mut group = c.benchmark_group("channel");
  group.throughput(Throughput::Elements(ITEMS as u64));

  group.bench_function("publish_one_subscriber", |b| {
    b.iter_with_setup(
      || {
        let fiber = fibers::thread();
        fiber.start();
        let channel = Channel::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sub = channel.subscribe(&fiber, move |_msg: usize| {
          counter.fetch_add(1, Ordering::Relaxed);
        });
        (fiber, channel, count, sub)
      },
      |(fiber, channel, count, _sub)| {
        for i in 0..ITEMS {
          channel.publish(i);
        }
        while count.load(Ordering::Relaxed) < ITEMS {
          thread::yield_now();
        }
        fiber.dispose();
        fiber.join();
      },
    )
  });

  group.finish();
}

criterion_group!(benches, bench_thread_fiber_enqueue, bench_channel_publish);
criterion_main!(benches);
