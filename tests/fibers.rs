mod common;
use common::*;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use strand::fibers;
use strand::queues::BoundedQueue;
use strand::{ExecutionContext, QueueFull};

#[test]
fn thread_fiber_executes_in_submission_order() {
  init_logging();
  let fiber = fibers::thread();
  fiber.start();

  let order = Arc::new(Mutex::new(Vec::new()));
  for i in 0..ITEMS_HIGH {
    let order = order.clone();
    fiber.enqueue(Box::new(move || order.lock().push(i)));
  }

  assert!(wait_until(LONG_TIMEOUT, || order.lock().len() == ITEMS_HIGH));
  assert_eq!(*order.lock(), (0..ITEMS_HIGH).collect::<Vec<_>>());

  fiber.dispose();
  fiber.join();
}

#[test]
fn actions_enqueued_before_start_replay_in_order() {
  let fiber = fibers::thread();
  let order = Arc::new(Mutex::new(Vec::new()));

  for i in 0..ITEMS_LOW {
    let order = order.clone();
    fiber.enqueue(Box::new(move || order.lock().push(i)));
  }
  assert!(order.lock().is_empty());

  fiber.start();
  assert!(wait_until(SHORT_TIMEOUT, || order.lock().len() == ITEMS_LOW));
  assert_eq!(*order.lock(), (0..ITEMS_LOW).collect::<Vec<_>>());

  fiber.dispose();
}

#[test]
fn actions_enqueued_after_dispose_are_dropped() {
  let fiber = fibers::thread();
  fiber.start();
  fiber.dispose();

  let count = Arc::new(AtomicUsize::new(0));
  let c = count.clone();
  fiber.enqueue(Box::new(move || {
    c.fetch_add(1, Ordering::SeqCst);
  }));

  thread::sleep(Duration::from_millis(50));
  assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
#[should_panic(expected = "already started")]
fn starting_twice_panics() {
  let fiber = fibers::thread();
  fiber.start();
  fiber.start();
}

#[test]
fn bounded_thread_fiber_surfaces_backpressure() {
  let queue = Arc::new(BoundedQueue::new(2, Duration::ZERO));
  let fiber = fibers::thread_with_queue(queue, "bounded-fiber");
  fiber.start();

  // Occupy the consumer so the queue can fill behind it.
  let release = Arc::new(AtomicBool::new(false));
  let blocking = Arc::new(AtomicBool::new(false));
  {
    let release = release.clone();
    let blocking = blocking.clone();
    fiber.enqueue(Box::new(move || {
      blocking.store(true, Ordering::SeqCst);
      while !release.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
      }
    }));
  }
  assert!(wait_until(SHORT_TIMEOUT, || blocking.load(Ordering::SeqCst)));

  fiber.try_enqueue(Box::new(|| {})).unwrap();
  fiber.try_enqueue(Box::new(|| {})).unwrap();
  let err = fiber.try_enqueue(Box::new(|| {})).unwrap_err();
  assert_eq!(err, QueueFull { depth: 2 });

  release.store(true, Ordering::SeqCst);
  assert!(wait_until(SHORT_TIMEOUT, || fiber
    .try_enqueue(Box::new(|| {}))
    .is_ok()));

  fiber.dispose();
  fiber.join();
}

#[test]
fn pool_fiber_executes_in_submission_order() {
  let fiber = fibers::pool(Arc::new(SpawnPool));
  fiber.start();

  let order = Arc::new(Mutex::new(Vec::new()));
  for i in 0..ITEMS_HIGH {
    let order = order.clone();
    fiber.enqueue(Box::new(move || order.lock().push(i)));
  }

  assert!(wait_until(LONG_TIMEOUT, || order.lock().len() == ITEMS_HIGH));
  assert_eq!(*order.lock(), (0..ITEMS_HIGH).collect::<Vec<_>>());

  fiber.dispose();
}

#[test]
fn paused_pool_fiber_holds_then_replays_on_resume() {
  let fiber = fibers::pool(Arc::new(SpawnPool));
  fiber.start();

  // Make sure the running flush loop has settled before pausing.
  let started = Arc::new(AtomicBool::new(false));
  let s = started.clone();
  fiber.enqueue(Box::new(move || s.store(true, Ordering::SeqCst)));
  assert!(wait_until(SHORT_TIMEOUT, || started.load(Ordering::SeqCst)));

  fiber.pause();
  assert!(fiber.is_paused());

  let order = Arc::new(Mutex::new(Vec::new()));
  for i in 1..=3 {
    let order = order.clone();
    fiber.enqueue(Box::new(move || order.lock().push(i)));
  }
  thread::sleep(Duration::from_millis(50));
  assert!(order.lock().is_empty());

  let first = {
    let order = order.clone();
    Box::new(move || order.lock().push(0))
  };
  fiber.resume_with(first);

  assert!(wait_until(SHORT_TIMEOUT, || order.lock().len() == 4));
  assert_eq!(*order.lock(), vec![0, 1, 2, 3]);

  fiber.dispose();
}

#[test]
#[should_panic(expected = "already disposed")]
fn pausing_a_disposed_fiber_panics() {
  let fiber = fibers::pool(Arc::new(SpawnPool));
  fiber.start();
  fiber.dispose();
  fiber.pause();
}

#[test]
#[should_panic(expected = "not paused")]
fn resuming_a_running_fiber_panics() {
  let fiber = fibers::pool(Arc::new(SpawnPool));
  fiber.start();
  fiber.resume();
}

#[test]
fn host_fiber_marshals_onto_host_context() {
  // A stub fiber stands in for the host loop: actions marshal onto it and
  // run when the host drains.
  let host_loop = fibers::stub();
  let fiber = fibers::host(host_loop.clone());
  fiber.start();

  let count = Arc::new(AtomicUsize::new(0));
  let c = count.clone();
  fiber.enqueue(Box::new(move || {
    c.fetch_add(1, Ordering::SeqCst);
  }));

  assert_eq!(count.load(Ordering::SeqCst), 0);
  host_loop.execute_all_pending();
  assert_eq!(count.load(Ordering::SeqCst), 1);

  // Disabling the gate quiesces actions that have not yet run on the host.
  let c = count.clone();
  fiber.enqueue(Box::new(move || {
    c.fetch_add(1, Ordering::SeqCst);
  }));
  fiber.executor().set_enabled(false);
  host_loop.execute_all_pending();
  assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn stub_fiber_is_deterministic() {
  let fiber = fibers::stub();

  let count = Arc::new(AtomicUsize::new(0));
  for _ in 0..3 {
    let c = count.clone();
    fiber.enqueue(Box::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }));
  }
  assert_eq!(fiber.pending_count(), 3);
  assert_eq!(count.load(Ordering::SeqCst), 0);

  fiber.execute_all_pending();
  assert_eq!(count.load(Ordering::SeqCst), 3);
  assert_eq!(fiber.pending_count(), 0);
}

#[test]
fn stub_fiber_immediate_mode_drains_descendants() {
  let fiber = fibers::stub();
  fiber.set_execute_pending_immediately(true);

  let order = Arc::new(Mutex::new(Vec::new()));
  let inner_order = order.clone();
  let inner_fiber = fiber.clone();
  fiber.enqueue(Box::new(move || {
    inner_order.lock().push(1);
    let nested = inner_order.clone();
    inner_fiber.enqueue(Box::new(move || nested.lock().push(2)));
    inner_order.lock().push(3);
  }));

  // The root action ran at once; the nested enqueue drained right after it.
  assert_eq!(*order.lock(), vec![1, 3, 2]);
  assert_eq!(fiber.pending_count(), 0);
}
