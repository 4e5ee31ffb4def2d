// src/fibers/thread.rs

//! Fiber backed by one dedicated consumer thread.
//!
//! The thread body is the queue's blocking drain loop; the queue strategy is
//! chosen per instance, so bounded or spin-wait behavior is a constructor
//! argument rather than a different fiber type.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::{ExecutionStrategy, Fiber, CREATED, PAUSED, RUNNING};
use crate::context::Action;
use crate::error::QueueFull;
use crate::queues::{TaskQueue, UnboundedQueue};

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

pub struct ThreadBacked {
  pub(crate) queue: Arc<dyn TaskQueue>,
  name: String,
  handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ExecutionStrategy for ThreadBacked {
  fn dispatch(&self, action: Action) {
    if let Err(err) = self.queue.enqueue(action) {
      panic!("{}", err);
    }
  }

  fn begin(&self) {
    let queue = self.queue.clone();
    let handle = thread::Builder::new()
      .name(self.name.clone())
      .spawn(move || queue.run())
      .expect("failed to spawn fiber thread");
    log::trace!("fiber thread {:?} started", self.name);
    *self.handle.lock() = Some(handle);
  }

  fn shutdown(&self) {
    self.queue.stop();
  }
}

/// Fiber backed by a dedicated thread.
pub type ThreadFiber = Fiber<ThreadBacked>;

/// Creates a thread fiber over an unbounded queue with a generated name.
pub fn thread() -> Arc<ThreadFiber> {
  thread_with_queue(Arc::new(UnboundedQueue::new()), &next_thread_name())
}

/// Creates a thread fiber over an unbounded queue with the given thread name.
pub fn thread_named(name: &str) -> Arc<ThreadFiber> {
  thread_with_queue(Arc::new(UnboundedQueue::new()), name)
}

/// Creates a thread fiber over the given queue strategy.
pub fn thread_with_queue(queue: Arc<dyn TaskQueue>, name: &str) -> Arc<ThreadFiber> {
  Fiber::with_strategy(ThreadBacked {
    queue,
    name: name.to_owned(),
    handle: Mutex::new(None),
  })
}

fn next_thread_name() -> String {
  format!(
    "strand-fiber-{}",
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
  )
}

impl Fiber<ThreadBacked> {
  /// Enqueues an action, surfacing bounded-queue backpressure to the caller
  /// instead of panicking.
  ///
  /// The infallible [`enqueue`](crate::context::ExecutionContext::enqueue)
  /// panics when the backing queue rejects an action after its wait budget;
  /// this is the path for callers who own the retry/drop/backoff decision.
  pub fn try_enqueue(&self, action: Action) -> Result<(), QueueFull> {
    match self.state.load(Ordering::Acquire) {
      RUNNING | PAUSED => self.strategy.queue.enqueue(action),
      CREATED => {
        crate::context::ExecutionContext::enqueue(self, action);
        Ok(())
      }
      _ => Ok(()),
    }
  }

  /// Waits for the consumer thread to exit. Call after
  /// [`dispose`](Fiber::dispose); propagates a panic from the fiber thread.
  pub fn join(&self) {
    let handle = self.strategy.handle.lock().take();
    if let Some(handle) = handle {
      if let Err(payload) = handle.join() {
        std::panic::resume_unwind(payload);
      }
    }
  }
}
