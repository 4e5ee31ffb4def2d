// src/queues/bounded.rs

//! Bounded queue with an overflow policy.
//!
//! Producers block until the depth recedes below the configured maximum, for
//! up to the configured wait; if the wait elapses and the queue is still
//! full, the enqueue fails with [`QueueFull`] so the caller can decide
//! between retry, drop, and backoff. A zero wait fails immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{QueueState, TaskQueue};
use crate::context::Action;
use crate::error::QueueFull;
use crate::executor::{DefaultExecutor, Executor};

pub struct BoundedQueue {
  executor: Arc<dyn Executor>,
  max_depth: usize,
  max_wait: Duration,
  state: Mutex<QueueState>,
  // One condvar serves both sides: enqueues wake the consumer, drains wake
  // blocked producers.
  cond: Condvar,
}

impl BoundedQueue {
  /// A `max_depth` of zero disables the bound entirely.
  pub fn new(max_depth: usize, max_wait: Duration) -> Self {
    Self::with_executor(Arc::new(DefaultExecutor::new()), max_depth, max_wait)
  }

  pub fn with_executor(
    executor: Arc<dyn Executor>,
    max_depth: usize,
    max_wait: Duration,
  ) -> Self {
    Self {
      executor,
      max_depth,
      max_wait,
      state: Mutex::new(QueueState::new()),
      cond: Condvar::new(),
    }
  }

  pub fn max_depth(&self) -> usize {
    self.max_depth
  }

  pub fn max_wait(&self) -> Duration {
    self.max_wait
  }

  /// Current number of buffered actions.
  pub fn depth(&self) -> usize {
    self.state.lock().actions.len()
  }

  /// Returns `Ok(true)` when the action may be added, `Ok(false)` when the
  /// queue has been stopped (the action is dropped).
  fn space_available(
    &self,
    state: &mut MutexGuard<'_, QueueState>,
    to_add: usize,
  ) -> Result<bool, QueueFull> {
    if !state.running {
      return Ok(false);
    }
    while self.max_depth > 0 && state.actions.len() + to_add > self.max_depth {
      if self.max_wait.is_zero() {
        return Err(QueueFull {
          depth: state.actions.len(),
        });
      }
      let _ = self.cond.wait_for(state, self.max_wait);
      if !state.running {
        return Ok(false);
      }
      if self.max_depth > 0 && state.actions.len() + to_add > self.max_depth {
        return Err(QueueFull {
          depth: state.actions.len(),
        });
      }
    }
    Ok(true)
  }

  fn dequeue_all(&self) -> Option<Vec<Action>> {
    let mut state = self.state.lock();
    while state.actions.is_empty() && state.running {
      self.cond.wait(&mut state);
    }
    if !state.running {
      return None;
    }
    let batch = std::mem::take(&mut state.actions);
    // Depth just receded to zero: release any producers stuck in
    // space_available.
    self.cond.notify_all();
    Some(batch)
  }
}

impl TaskQueue for BoundedQueue {
  fn enqueue(&self, action: Action) -> Result<(), QueueFull> {
    let mut state = self.state.lock();
    if self.space_available(&mut state, 1)? {
      state.actions.push(action);
      self.cond.notify_all();
    }
    Ok(())
  }

  fn run(&self) {
    while let Some(batch) = self.dequeue_all() {
      self.executor.execute_batch(batch);
    }
  }

  fn stop(&self) {
    self.state.lock().running = false;
    self.cond.notify_all();
  }
}
