mod common;
use common::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serial_test::serial;
use strand::fibers;
use strand::{ExecutionContext, FiberContext};

#[test]
#[serial]
fn one_shot_fires_after_delay_on_the_fiber() {
  init_logging();
  let fiber = fibers::thread();
  fiber.start();

  let fired_at = Arc::new(Mutex::new(None));
  let fiber_thread = Arc::new(Mutex::new(None));

  // Learn the fiber thread's id from a directly enqueued action.
  {
    let fiber_thread = fiber_thread.clone();
    fiber.enqueue(Box::new(move || {
      *fiber_thread.lock() = Some(thread::current().id());
    }));
  }

  let start = Instant::now();
  {
    let fired_at = fired_at.clone();
    fiber.schedule(
      Arc::new(move || {
        *fired_at.lock() = Some((start.elapsed(), thread::current().id()));
      }),
      Duration::from_millis(50),
    );
  }

  assert!(wait_until(LONG_TIMEOUT, || fired_at.lock().is_some()));
  let (elapsed, fired_thread) = fired_at.lock().unwrap();
  assert!(elapsed >= Duration::from_millis(50));
  // Delivery happens on the fiber thread, never on the timer thread.
  assert_eq!(Some(fired_thread), *fiber_thread.lock());

  fiber.dispose();
}

#[test]
fn zero_delay_enqueues_immediately() {
  // An unstarted fiber buffers enqueues, so a zero-delay schedule landing in
  // the buffer proves it skipped the timer and was not run on the caller.
  let fiber = fibers::thread();
  let count = Arc::new(AtomicUsize::new(0));

  let c = count.clone();
  fiber.schedule(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::ZERO,
  );
  assert_eq!(count.load(Ordering::SeqCst), 0);

  fiber.start();
  assert!(wait_until(SHORT_TIMEOUT, || count.load(Ordering::SeqCst) == 1));
  fiber.dispose();
}

#[test]
fn disposing_a_zero_delay_token_before_it_runs_cancels_it() {
  let fiber = fibers::thread();
  let count = Arc::new(AtomicUsize::new(0));

  let c = count.clone();
  let token = fiber.schedule(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::ZERO,
  );
  token.dispose();

  fiber.start();
  thread::sleep(Duration::from_millis(50));
  assert_eq!(count.load(Ordering::SeqCst), 0);
  fiber.dispose();
}

#[test]
#[serial]
fn disposing_before_fire_prevents_delivery() {
  let fiber = fibers::thread();
  fiber.start();

  let count = Arc::new(AtomicUsize::new(0));
  let c = count.clone();
  let token = fiber.schedule(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::from_millis(50),
  );
  token.dispose();

  thread::sleep(Duration::from_millis(150));
  assert_eq!(count.load(Ordering::SeqCst), 0);

  // Disposing again after the would-have-fired time is a no-op.
  token.dispose();
  fiber.dispose();
}

#[test]
#[serial]
fn recurring_schedule_fires_until_disposed() {
  let fiber = fibers::thread();
  fiber.start();

  let count = Arc::new(AtomicUsize::new(0));
  let c = count.clone();
  let token = fiber.schedule_on_interval(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::from_millis(20),
    Duration::from_millis(20),
  );

  assert!(wait_until(LONG_TIMEOUT, || count.load(Ordering::SeqCst) >= 3));
  token.dispose();

  thread::sleep(Duration::from_millis(60));
  let settled = count.load(Ordering::SeqCst);
  thread::sleep(Duration::from_millis(100));
  assert_eq!(count.load(Ordering::SeqCst), settled);

  fiber.dispose();
}

#[test]
#[serial]
fn fiber_disposal_cancels_outstanding_schedules() {
  let fiber = fibers::thread();
  fiber.start();

  let count = Arc::new(AtomicUsize::new(0));
  for _ in 0..3 {
    let c = count.clone();
    fiber.schedule(
      Arc::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }),
      Duration::from_millis(80),
    );
  }
  let c = count.clone();
  fiber.schedule_on_interval(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::from_millis(80),
    Duration::from_millis(80),
  );

  // Give the scheduler's enqueued bookkeeping a chance to run, then tear
  // down before anything fires.
  thread::sleep(Duration::from_millis(20));
  fiber.dispose();

  thread::sleep(Duration::from_millis(200));
  assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn stub_fiber_fires_scheduled_items_manually() {
  let fiber = fibers::stub();
  let count = Arc::new(AtomicUsize::new(0));

  let c = count.clone();
  fiber.schedule(
    Arc::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }),
    Duration::from_millis(500),
  );
  let c = count.clone();
  fiber.schedule_on_interval(
    Arc::new(move || {
      c.fetch_add(10, Ordering::SeqCst);
    }),
    Duration::from_millis(500),
    Duration::from_millis(500),
  );
  assert_eq!(fiber.scheduled_count(), 2);

  fiber.execute_all_scheduled();
  assert_eq!(count.load(Ordering::SeqCst), 11);
  // The one-shot removed itself; the recurring item remains.
  assert_eq!(fiber.scheduled_count(), 1);

  fiber.execute_all_scheduled();
  assert_eq!(count.load(Ordering::SeqCst), 21);

  fiber.dispose();
  assert_eq!(fiber.scheduled_count(), 0);
}
