// src/scheduling/timer.rs

//! Process-global timer thread.
//!
//! Scheduled items are kept in a min-heap keyed by due time. The thread pops
//! due entries and fires them outside the lock; a fire only *enqueues* work
//! onto the item's execution context, so the real callback always runs on the
//! owning fiber's serial stream. Recurring items re-arm by reinsertion;
//! cancelled entries fizzle when their due time arrives.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use parking_lot::{Condvar, Mutex};

use super::TimerAction;

struct TimerEntry {
  due: Instant,
  seq: u64,
  action: Arc<TimerAction>,
}

impl PartialEq for TimerEntry {
  fn eq(&self, other: &Self) -> bool {
    self.due == other.due && self.seq == other.seq
  }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TimerEntry {
  // Reversed so the BinaryHeap acts as a min-heap; seq breaks due-time ties
  // in arming order.
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

struct TimerShared {
  entries: Mutex<BinaryHeap<TimerEntry>>,
  wakeup: Condvar,
  next_seq: AtomicU64,
}

lazy_static! {
  static ref TIMER: Arc<TimerShared> = {
    let shared = Arc::new(TimerShared {
      entries: Mutex::new(BinaryHeap::new()),
      wakeup: Condvar::new(),
      next_seq: AtomicU64::new(0),
    });
    let thread_shared = shared.clone();
    thread::Builder::new()
      .name("strand-timer".into())
      .spawn(move || run_loop(thread_shared))
      .expect("failed to spawn timer thread");
    shared
  };
}

/// Arms `action` to fire after `delay`.
pub(crate) fn arm(action: Arc<TimerAction>, delay: Duration) {
  push(&TIMER, action, delay);
}

fn push(shared: &TimerShared, action: Arc<TimerAction>, delay: Duration) {
  let entry = TimerEntry {
    due: Instant::now() + delay,
    seq: shared.next_seq.fetch_add(1, atomic::Ordering::Relaxed),
    action,
  };
  shared.entries.lock().push(entry);
  shared.wakeup.notify_all();
}

fn run_loop(shared: Arc<TimerShared>) {
  let mut entries = shared.entries.lock();
  loop {
    let now = Instant::now();
    let mut due = Vec::new();
    while entries.peek().map_or(false, |entry| entry.due <= now) {
      if let Some(entry) = entries.pop() {
        due.push(entry);
      }
    }

    if !due.is_empty() {
      // Fire outside the heap lock: a fire enqueues onto an execution
      // context, which takes that context's own locks.
      drop(entries);
      for entry in due {
        if let Some(interval) = TimerAction::fire(&entry.action) {
          push(&shared, entry.action, interval);
        }
      }
      entries = shared.entries.lock();
      continue;
    }

    match entries.peek().map(|entry| entry.due) {
      Some(next_due) => {
        let _ = shared.wakeup.wait_until(&mut entries, next_due);
      }
      None => {
        shared.wakeup.wait(&mut entries);
      }
    }
  }
}
