// src/fibers/mod.rs

//! Fibers: logical single-threaded execution contexts.
//!
//! A fiber serializes every action handed to it, regardless of which thread
//! produced it, so consumers need no locking of their own. One generic
//! [`Fiber`] owns the lifecycle state machine, the scheduler, and the
//! subscription registry; the backing mechanism (dedicated thread, shared
//! pool, host loop) is a pluggable [`ExecutionStrategy`]. The deterministic
//! [`StubFiber`] for tests lives in its own type.

mod host;
mod pool;
mod stub;
mod thread;

pub use host::{host, HostBacked, HostFiber};
pub use pool::{pool, PoolBacked, PoolFiber, ThreadPool};
pub use stub::{stub, StubFiber, StubScheduledTask};
pub use thread::{
  thread, thread_named, thread_with_queue, ThreadBacked, ThreadFiber,
};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{Action, Disposable, ExecutionContext, ScheduledTask};
use crate::registry::{RegistrationId, Subscriptions};
use crate::scheduling::Scheduler;

/// The capability surface every fiber variant exposes: serialized enqueue,
/// timer scheduling, and subscription lifecycle registration.
pub trait FiberContext: ExecutionContext {
  /// Enqueues `task` onto this fiber after `delay`; zero enqueues
  /// immediately. The token cancels delivery if disposed before the fire.
  fn schedule(&self, task: ScheduledTask, delay: Duration) -> Arc<dyn Disposable>;

  /// Enqueues `task` after `first` and then every `every` until the token is
  /// disposed.
  fn schedule_on_interval(
    &self,
    task: ScheduledTask,
    first: Duration,
    every: Duration,
  ) -> Arc<dyn Disposable>;

  /// Registers a disposable to be swept when this fiber is disposed.
  fn register_subscription(&self, subscription: Arc<dyn Disposable>) -> RegistrationId;

  /// Removes a registration. Idempotent.
  fn deregister_subscription(&self, id: RegistrationId) -> bool;
}

/// Backing mechanism for a [`Fiber`]: where dispatched actions actually run.
pub trait ExecutionStrategy: Send + Sync + 'static {
  /// Hands an action to the backing mechanism. Only called while the fiber
  /// is running or paused.
  fn dispatch(&self, action: Action);

  /// Called once when the fiber starts, after any buffered actions have been
  /// replayed into `dispatch`.
  fn begin(&self) {}

  /// Called once when the fiber is disposed.
  fn shutdown(&self) {}
}

pub(crate) const CREATED: u8 = 0;
pub(crate) const RUNNING: u8 = 1;
pub(crate) const STOPPED: u8 = 2;
pub(crate) const PAUSED: u8 = 3;

/// A fiber: composes an execution strategy with a scheduler and a
/// subscription registry.
///
/// Lifecycle: actions enqueued before [`start`](Self::start) are buffered and
/// replayed in order; actions enqueued after [`dispose`](Self::dispose) are
/// discarded. Starting twice is a usage error and panics.
pub struct Fiber<S: ExecutionStrategy> {
  pub(crate) state: AtomicU8,
  startup: Mutex<Vec<Action>>,
  pub(crate) strategy: S,
  scheduler: Scheduler,
  subscriptions: Subscriptions,
}

impl<S: ExecutionStrategy> Fiber<S> {
  /// Builds a fiber over a custom execution strategy. The built-in
  /// constructors in this module cover the common backings.
  pub fn with_strategy(strategy: S) -> Arc<Self> {
    Arc::new_cyclic(|weak: &Weak<Self>| {
      let context: Weak<dyn ExecutionContext> = weak.clone();
      Self {
        state: AtomicU8::new(CREATED),
        startup: Mutex::new(Vec::new()),
        strategy,
        scheduler: Scheduler::new(context),
        subscriptions: Subscriptions::new(),
      }
    })
  }

  /// Begins consuming actions, replaying anything buffered since creation.
  ///
  /// # Panics
  ///
  /// Panics if the fiber was already started or has been disposed.
  pub fn start(&self) {
    let mut startup = self.startup.lock();
    match self.state.load(Ordering::Acquire) {
      RUNNING | PAUSED => panic!("fiber already started"),
      STOPPED => panic!("fiber already disposed"),
      _ => {}
    }
    for action in startup.drain(..) {
      self.strategy.dispatch(action);
    }
    self.state.store(RUNNING, Ordering::Release);
    drop(startup);
    self.strategy.begin();
  }

  /// Tears the fiber down: cancels all pending scheduled items, disposes all
  /// registered subscriptions, and stops the backing strategy. Idempotent;
  /// also invoked on drop. Terminal: a disposed fiber cannot be restarted.
  pub fn dispose(&self) {
    if self.state.swap(STOPPED, Ordering::AcqRel) == STOPPED {
      return;
    }
    log::trace!("fiber disposed");
    self.scheduler.dispose();
    self.subscriptions.dispose_all();
    self.strategy.shutdown();
  }

  /// Number of currently registered subscriptions.
  pub fn subscription_count(&self) -> usize {
    self.subscriptions.count()
  }
}

impl<S: ExecutionStrategy> ExecutionContext for Fiber<S> {
  fn enqueue(&self, action: Action) {
    match self.state.load(Ordering::Acquire) {
      RUNNING | PAUSED => self.strategy.dispatch(action),
      CREATED => {
        let mut startup = self.startup.lock();
        // Re-check under the lock: start() may have won the race.
        match self.state.load(Ordering::Acquire) {
          CREATED => startup.push(action),
          RUNNING | PAUSED => {
            drop(startup);
            self.strategy.dispatch(action);
          }
          _ => {}
        }
      }
      _ => {}
    }
  }
}

impl<S: ExecutionStrategy> FiberContext for Fiber<S> {
  fn schedule(&self, task: ScheduledTask, delay: Duration) -> Arc<dyn Disposable> {
    self.scheduler.schedule(task, delay)
  }

  fn schedule_on_interval(
    &self,
    task: ScheduledTask,
    first: Duration,
    every: Duration,
  ) -> Arc<dyn Disposable> {
    self.scheduler.schedule_on_interval(task, first, every)
  }

  fn register_subscription(&self, subscription: Arc<dyn Disposable>) -> RegistrationId {
    self.subscriptions.register(subscription)
  }

  fn deregister_subscription(&self, id: RegistrationId) -> bool {
    self.subscriptions.deregister(id)
  }
}

impl<S: ExecutionStrategy> Drop for Fiber<S> {
  fn drop(&mut self) {
    self.dispose();
  }
}
