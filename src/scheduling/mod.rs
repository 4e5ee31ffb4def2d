// src/scheduling/mod.rs

//! Timer-driven dispatch onto an execution context.
//!
//! A [`Scheduler`] never runs a scheduled task on the caller's thread or on
//! the timer thread: delivery is always an enqueue onto the bound execution
//! context, which preserves the context's serialization guarantee. Pending-set
//! bookkeeping is itself funneled through the context, so it stays serialized
//! with the fiber's own action stream.

mod timer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{Disposable, ExecutionContext, ScheduledTask};
use crate::registry::{RegistrationId, Subscriptions};

struct SchedulerShared {
  running: AtomicBool,
  context: Weak<dyn ExecutionContext>,
  pending: Subscriptions,
}

/// Enqueues tasks onto an execution context when their schedule elapses.
///
/// The scheduler holds only a weak reference to its context; once the context
/// is gone, fires and bookkeeping become no-ops.
pub struct Scheduler {
  shared: Arc<SchedulerShared>,
}

impl Scheduler {
  pub fn new(context: Weak<dyn ExecutionContext>) -> Self {
    Self {
      shared: Arc::new(SchedulerShared {
        running: AtomicBool::new(true),
        context,
        pending: Subscriptions::new(),
      }),
    }
  }

  /// Number of scheduled items not yet fired or disposed.
  pub fn pending_count(&self) -> usize {
    self.shared.pending.count()
  }

  /// Enqueues `task` onto the context after `delay`.
  ///
  /// A zero delay enqueues immediately (still never executing on the calling
  /// thread). The returned token cancels delivery if disposed before the
  /// fire; disposing afterwards is a no-op.
  pub fn schedule(&self, task: ScheduledTask, delay: Duration) -> Arc<dyn Disposable> {
    if delay.is_zero() {
      let pending = Arc::new(PendingAction {
        cancelled: AtomicBool::new(false),
        task,
      });
      if let Some(context) = self.shared.context.upgrade() {
        let to_run = pending.clone();
        context.enqueue(Box::new(move || to_run.run()));
      }
      return pending;
    }
    let action = TimerAction::new(&self.shared, task, None);
    self.add_pending(action.clone(), delay);
    action
  }

  /// Enqueues `task` after `first`, then again every `every` until the
  /// returned token is disposed. An in-flight fire may still complete after
  /// disposal.
  pub fn schedule_on_interval(
    &self,
    task: ScheduledTask,
    first: Duration,
    every: Duration,
  ) -> Arc<dyn Disposable> {
    let action = TimerAction::new(&self.shared, task, Some(every));
    self.add_pending(action.clone(), first);
    action
  }

  fn add_pending(&self, action: Arc<TimerAction>, first: Duration) {
    let shared = self.shared.clone();
    if let Some(context) = self.shared.context.upgrade() {
      context.enqueue(Box::new(move || {
        if shared.running.load(Ordering::Acquire) {
          let id = shared.pending.register(action.clone());
          action.set_registration(id);
          timer::arm(action, first);
        }
      }));
    }
  }

  /// Cancels every pending item. Called on fiber teardown.
  pub fn dispose(&self) {
    self.shared.running.store(false, Ordering::Release);
    let outstanding = self.shared.pending.count();
    if outstanding > 0 {
      log::trace!("scheduler disposed with {} pending items", outstanding);
    }
    self.shared.pending.dispose_all();
  }
}

/// A zero-delay scheduled task, already enqueued but still cancellable until
/// the context reaches it.
struct PendingAction {
  cancelled: AtomicBool,
  task: ScheduledTask,
}

impl PendingAction {
  fn run(&self) {
    if !self.cancelled.load(Ordering::Acquire) {
      (self.task)();
    }
  }
}

impl Disposable for PendingAction {
  fn dispose(&self) {
    self.cancelled.store(true, Ordering::Release);
  }
}

/// A timed scheduled item, one-shot (`interval: None`) or recurring.
pub(crate) struct TimerAction {
  cancelled: AtomicBool,
  task: ScheduledTask,
  scheduler: Weak<SchedulerShared>,
  interval: Option<Duration>,
  registration: Mutex<Option<RegistrationId>>,
}

impl TimerAction {
  fn new(
    shared: &Arc<SchedulerShared>,
    task: ScheduledTask,
    interval: Option<Duration>,
  ) -> Arc<Self> {
    Arc::new(Self {
      cancelled: AtomicBool::new(false),
      task,
      scheduler: Arc::downgrade(shared),
      interval,
      registration: Mutex::new(None),
    })
  }

  fn set_registration(&self, id: RegistrationId) {
    *self.registration.lock() = Some(id);
  }

  /// Runs on the timer thread. Returns the re-arm interval for live recurring
  /// items.
  pub(crate) fn fire(this: &Arc<Self>) -> Option<Duration> {
    let cancelled = this.cancelled.load(Ordering::Acquire);
    if this.interval.is_none() || cancelled {
      this.leave_pending_set();
    }
    if cancelled {
      return None;
    }
    // A dead scheduler or context also ends a recurring item: nothing could
    // deliver it, so there is no point re-arming.
    let shared = this.scheduler.upgrade()?;
    let context = shared.context.upgrade()?;
    let me = this.clone();
    context.enqueue(Box::new(move || {
      // Checked again on the fiber thread: disposal between the hops must
      // still suppress delivery.
      if !me.cancelled.load(Ordering::Acquire) {
        (me.task)();
      }
    }));
    this.interval
  }

  fn leave_pending_set(&self) {
    let id = *self.registration.lock();
    let Some(id) = id else {
      return;
    };
    if let Some(shared) = self.scheduler.upgrade() {
      if let Some(context) = shared.context.upgrade() {
        let shared = shared.clone();
        context.enqueue(Box::new(move || {
          shared.pending.deregister(id);
        }));
      }
    }
  }
}

impl Disposable for TimerAction {
  fn dispose(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      self.leave_pending_set();
    }
  }
}
