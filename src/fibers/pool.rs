// src/fibers/pool.rs

//! Fiber backed by a shared thread pool.
//!
//! Enqueued actions land in an internal buffer; the first action of a burst
//! queues a flush job on the pool. The flush drains a batch, executes it, and
//! re-queues itself if more work arrived meanwhile, so at most one flush job
//! is outstanding and callback execution stays serialized even though the
//! pool threads vary.
//!
//! This is the pausable variant: pausing gates the executor so new work is
//! held without unwinding the underlying pool job, and resuming replays the
//! held actions in order.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use super::{ExecutionStrategy, Fiber, PAUSED, RUNNING, STOPPED};
use crate::context::Action;
use crate::executor::{Executor, PausableExecutor};

/// Capability to queue a callback for background execution. Injected; the
/// crate never constructs a pool of its own.
pub trait ThreadPool: Send + Sync {
  fn queue(&self, job: Action);
}

struct PoolInner {
  actions: Vec<Action>,
  flush_pending: bool,
}

pub(crate) struct PoolShared {
  pool: Arc<dyn ThreadPool>,
  pub(crate) executor: PausableExecutor,
  inner: Mutex<PoolInner>,
}

impl PoolShared {
  fn flush(this: &Arc<Self>) {
    let batch = {
      let mut inner = this.inner.lock();
      if inner.actions.is_empty() {
        inner.flush_pending = false;
        return;
      }
      std::mem::take(&mut inner.actions)
    };
    this.executor.execute_batch(batch);

    let mut inner = this.inner.lock();
    if inner.actions.is_empty() {
      inner.flush_pending = false;
    } else {
      // More work arrived during the batch: stay pending and go around again.
      let shared = this.clone();
      this.pool.queue(Box::new(move || PoolShared::flush(&shared)));
    }
  }
}

pub struct PoolBacked {
  pub(crate) shared: Arc<PoolShared>,
}

impl ExecutionStrategy for PoolBacked {
  fn dispatch(&self, action: Action) {
    let mut inner = self.shared.inner.lock();
    inner.actions.push(action);
    if !inner.flush_pending {
      inner.flush_pending = true;
      let shared = self.shared.clone();
      self.shared.pool.queue(Box::new(move || PoolShared::flush(&shared)));
    }
  }

  fn begin(&self) {
    // Kick the flush loop in case nothing was buffered before start.
    self.dispatch(Box::new(|| {}));
  }
}

/// Fiber backed by a shared thread pool; supports pause/resume.
pub type PoolFiber = Fiber<PoolBacked>;

/// Creates a pool fiber over the injected thread pool.
pub fn pool(pool: Arc<dyn ThreadPool>) -> Arc<PoolFiber> {
  Fiber::with_strategy(PoolBacked {
    shared: Arc::new(PoolShared {
      pool,
      executor: PausableExecutor::new(),
      inner: Mutex::new(PoolInner {
        actions: Vec::new(),
        flush_pending: false,
      }),
    }),
  })
}

impl Fiber<PoolBacked> {
  pub fn is_paused(&self) -> bool {
    self.state.load(Ordering::Acquire) == PAUSED
  }

  /// Gates the executor: actions keep flowing to the flush loop but are held
  /// unexecuted until [`resume`](Self::resume). Pausing a fiber that is not
  /// running is ignored.
  ///
  /// # Panics
  ///
  /// Panics if the fiber has been disposed.
  pub fn pause(&self) {
    match self.state.load(Ordering::Acquire) {
      STOPPED => panic!("fiber already disposed"),
      RUNNING => {}
      _ => return,
    }
    self.strategy.shared.executor.pause();
    let _ = self
      .state
      .compare_exchange(RUNNING, PAUSED, Ordering::AcqRel, Ordering::Acquire);
  }

  /// Re-enables execution, replaying actions held while paused in order.
  ///
  /// # Panics
  ///
  /// Panics if the fiber is not paused.
  pub fn resume(&self) {
    self.resume_inner(None);
  }

  /// Like [`resume`](Self::resume), but runs `first` ahead of the held
  /// backlog.
  pub fn resume_with(&self, first: Action) {
    self.resume_inner(Some(first));
  }

  fn resume_inner(&self, first: Option<Action>) {
    if self.state.load(Ordering::Acquire) != PAUSED {
      panic!("fiber is not paused");
    }
    if self
      .state
      .compare_exchange(PAUSED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return;
    }
    self.strategy.shared.executor.resume(first);
    // Guarantee the flush loop restarts even if nothing new is enqueued.
    self.strategy.dispatch(Box::new(|| {}));
  }
}
