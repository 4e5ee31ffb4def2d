// src/queues/busy_wait.rs

//! Spin-then-block queue.
//!
//! The consumer busy-spins for the queue lock and re-checks for work,
//! counting spins between clock checks, and escalates to a blocking condvar
//! wait only once the elapsed-time threshold passes with nothing to do. This
//! trades CPU for reduced wake latency under bursty load.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{QueueState, TaskQueue};
use crate::context::Action;
use crate::error::QueueFull;
use crate::executor::{DefaultExecutor, Executor};

pub struct BusyWaitQueue {
  executor: Arc<dyn Executor>,
  spins_before_time_check: u32,
  time_before_block: Duration,
  state: Mutex<QueueState>,
  ready: Condvar,
}

impl BusyWaitQueue {
  pub fn new(spins_before_time_check: u32, time_before_block: Duration) -> Self {
    Self::with_executor(
      Arc::new(DefaultExecutor::new()),
      spins_before_time_check,
      time_before_block,
    )
  }

  pub fn with_executor(
    executor: Arc<dyn Executor>,
    spins_before_time_check: u32,
    time_before_block: Duration,
  ) -> Self {
    Self {
      executor,
      spins_before_time_check,
      time_before_block,
      state: Mutex::new(QueueState::new()),
      ready: Condvar::new(),
    }
  }

  fn dequeue_all(&self) -> Option<Vec<Action>> {
    let mut spins = 0u32;
    let mut idle_since = Instant::now();
    loop {
      let mut state = loop {
        match self.state.try_lock() {
          Some(guard) => break guard,
          None => std::hint::spin_loop(),
        }
      };
      if !state.running {
        return None;
      }
      if !state.actions.is_empty() {
        return Some(std::mem::take(&mut state.actions));
      }

      spins += 1;
      if spins >= self.spins_before_time_check {
        spins = 0;
        if idle_since.elapsed() > self.time_before_block {
          self.ready.wait(&mut state);
          idle_since = Instant::now();
          if !state.running {
            return None;
          }
          if !state.actions.is_empty() {
            return Some(std::mem::take(&mut state.actions));
          }
        }
      }
    }
  }
}

impl TaskQueue for BusyWaitQueue {
  fn enqueue(&self, action: Action) -> Result<(), QueueFull> {
    let mut state = self.state.lock();
    state.actions.push(action);
    self.ready.notify_all();
    Ok(())
  }

  fn run(&self) {
    while let Some(batch) = self.dequeue_all() {
      self.executor.execute_batch(batch);
    }
  }

  fn stop(&self) {
    self.state.lock().running = false;
    self.ready.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::thread;

  #[test]
  fn delivers_across_spin_and_block_phases() {
    let queue = Arc::new(BusyWaitQueue::new(100, Duration::from_millis(5)));
    let count = Arc::new(AtomicUsize::new(0));

    let consumer = {
      let queue = queue.clone();
      thread::spawn(move || queue.run())
    };

    // First burst lands during the spin phase.
    for _ in 0..10 {
      let c = count.clone();
      queue
        .enqueue(Box::new(move || {
          c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }
    while count.load(Ordering::SeqCst) < 10 {
      thread::yield_now();
    }

    // Let the consumer escalate to the blocking wait, then wake it.
    thread::sleep(Duration::from_millis(50));
    let c = count.clone();
    queue
      .enqueue(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }))
      .unwrap();
    while count.load(Ordering::SeqCst) < 11 {
      thread::yield_now();
    }

    queue.stop();
    consumer.join().unwrap();
  }
}
