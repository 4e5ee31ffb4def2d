// src/queues/mod.rs

//! Action queues: the buffers between producer threads and one consuming
//! thread.
//!
//! All variants share the same drain discipline: the consumer swaps the live
//! buffer with an empty scratch buffer inside a single critical section and
//! executes the batch outside the lock, so producers never block on callback
//! execution.

mod bounded;
mod busy_wait;

pub use bounded::BoundedQueue;
pub use busy_wait::BusyWaitQueue;

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::context::Action;
use crate::error::QueueFull;
use crate::executor::{DefaultExecutor, Executor};

/// A buffer of pending actions with a blocking drain-and-run loop.
pub trait TaskQueue: Send + Sync {
  /// Adds an action. Bounded variants may block the producer and fail with
  /// [`QueueFull`] once their wait budget elapses; enqueues after
  /// [`stop`](Self::stop) are silently ignored.
  fn enqueue(&self, action: Action) -> Result<(), QueueFull>;

  /// Blocks the calling thread draining and executing batches until stopped.
  fn run(&self);

  /// Makes `run` return. Terminal; a stopped queue cannot be restarted.
  fn stop(&self);
}

pub(crate) struct QueueState {
  pub(crate) actions: Vec<Action>,
  pub(crate) running: bool,
}

impl QueueState {
  pub(crate) fn new() -> Self {
    Self {
      actions: Vec::new(),
      running: true,
    }
  }
}

/// Unbounded queue: producers never block; the consumer waits on a condvar
/// when empty.
pub struct UnboundedQueue {
  executor: Arc<dyn Executor>,
  state: Mutex<QueueState>,
  ready: Condvar,
}

impl UnboundedQueue {
  pub fn new() -> Self {
    Self::with_executor(Arc::new(DefaultExecutor::new()))
  }

  pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
    Self {
      executor,
      state: Mutex::new(QueueState::new()),
      ready: Condvar::new(),
    }
  }

  fn dequeue_all(&self) -> Option<Vec<Action>> {
    let mut state = self.state.lock();
    while state.actions.is_empty() && state.running {
      self.ready.wait(&mut state);
    }
    if !state.running {
      return None;
    }
    Some(std::mem::take(&mut state.actions))
  }
}

impl Default for UnboundedQueue {
  fn default() -> Self {
    Self::new()
  }
}

impl TaskQueue for UnboundedQueue {
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
