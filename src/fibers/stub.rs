// src/fibers/stub.rs

//! Deterministic fiber for tests.
//!
//! No backing thread: enqueued actions collect in a pending list (or execute
//! immediately, draining descendants to quiescence, when configured to) and
//! scheduled items collect in a list for manual firing. The test driver
//! controls every interleaving.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{Action, Disposable, ExecutionContext, ScheduledTask};
use crate::registry::{RegistrationId, Subscriptions};

use super::FiberContext;

struct StubState {
  pending: VecDeque<Action>,
  immediate: bool,
  // Guards immediate mode against re-entrant enqueues from inside an action:
  // only the outermost enqueue drives execution.
  root: bool,
}

struct ScheduledList {
  items: Mutex<Vec<(u64, Arc<StubScheduledTask>)>>,
  next_id: AtomicU64,
}

/// A scheduled item held for manual, deterministic firing.
pub struct StubScheduledTask {
  task: ScheduledTask,
  first: Duration,
  every: Option<Duration>,
  id: u64,
  list: Weak<ScheduledList>,
}

impl StubScheduledTask {
  pub fn first_interval(&self) -> Duration {
    self.first
  }

  /// Recurring interval; `None` for one-shot items.
  pub fn interval(&self) -> Option<Duration> {
    self.every
  }

  /// Fires the item on the calling thread. One-shot items remove themselves
  /// from the scheduled list.
  pub fn execute(&self) {
    (self.task)();
    if self.every.is_none() {
      self.dispose();
    }
  }
}

impl Disposable for StubScheduledTask {
  fn dispose(&self) {
    if let Some(list) = self.list.upgrade() {
      list.items.lock().retain(|(id, _)| *id != self.id);
    }
  }
}

/// Fiber with no backing thread, for making asynchronous code synchronous and
/// deterministic in tests.
pub struct StubFiber {
  state: Mutex<StubState>,
  scheduled: Arc<ScheduledList>,
  subscriptions: Subscriptions,
}

/// Creates a stub fiber.
pub fn stub() -> Arc<StubFiber> {
  Arc::new(StubFiber {
    state: Mutex::new(StubState {
      pending: VecDeque::new(),
      immediate: false,
      root: true,
    }),
    scheduled: Arc::new(ScheduledList {
      items: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(1),
    }),
    subscriptions: Subscriptions::new(),
  })
}

impl StubFiber {
  /// When set, enqueued actions execute on the calling thread at once, then
  /// drain any actions they enqueued, until nothing is left.
  pub fn set_execute_pending_immediately(&self, immediate: bool) {
    self.state.lock().immediate = immediate;
  }

  pub fn pending_count(&self) -> usize {
    self.state.lock().pending.len()
  }

  pub fn scheduled_count(&self) -> usize {
    self.scheduled.items.lock().len()
  }

  pub fn subscription_count(&self) -> usize {
    self.subscriptions.count()
  }

  /// No-op: a stub fiber is always ready.
  pub fn start(&self) {}

  /// Executes every action currently pending. Actions enqueued by those
  /// actions stay pending.
  pub fn execute_all_pending(&self) {
    let drained: Vec<Action> = {
      let mut state = self.state.lock();
      state.pending.drain(..).collect()
    };
    for action in drained {
      action();
    }
  }

  /// Executes pending actions until the list is empty, including actions
  /// enqueued along the way.
  pub fn execute_all_pending_until_empty(&self) {
    loop {
      let next = self.state.lock().pending.pop_front();
      match next {
        Some(action) => action(),
        None => break,
      }
    }
  }

  /// Fires every currently scheduled item once. One-shot items self-remove.
  pub fn execute_all_scheduled(&self) {
    let snapshot: Vec<Arc<StubScheduledTask>> = {
      let items = self.scheduled.items.lock();
      items.iter().map(|(_, item)| item.clone()).collect()
    };
    for item in snapshot {
      item.execute();
    }
  }

  /// Disposes all scheduled items and subscriptions and clears pending
  /// actions.
  pub fn dispose(&self) {
    let scheduled: Vec<Arc<StubScheduledTask>> = {
      let items = self.scheduled.items.lock();
      items.iter().map(|(_, item)| item.clone()).collect()
    };
    for item in scheduled {
      item.dispose();
    }
    self.subscriptions.dispose_all();
    self.state.lock().pending.clear();
  }

  fn add_scheduled(
    &self,
    task: ScheduledTask,
    first: Duration,
    every: Option<Duration>,
  ) -> Arc<StubScheduledTask> {
    let id = self.scheduled.next_id.fetch_add(1, Ordering::Relaxed);
    let item = Arc::new(StubScheduledTask {
      task,
      first,
      every,
      id,
      list: Arc::downgrade(&self.scheduled),
    });
    self.scheduled.items.lock().push((id, item.clone()));
    item
  }
}

impl ExecutionContext for StubFiber {
  fn enqueue(&self, action: Action) {
    let mut state = self.state.lock();
    if state.immediate && state.root {
      state.root = false;
      drop(state);
      action();
      self.execute_all_pending_until_empty();
      self.state.lock().root = true;
    } else {
      state.pending.push_back(action);
    }
  }
}

impl FiberContext for StubFiber {
  fn schedule(&self, task: ScheduledTask, delay: Duration) -> Arc<dyn Disposable> {
    self.add_scheduled(task, delay, None)
  }

  fn schedule_on_interval(
    &self,
    task: ScheduledTask,
    first: Duration,
    every: Duration,
  ) -> Arc<dyn Disposable> {
    self.add_scheduled(task, first, Some(every))
  }

  fn register_subscription(&self, subscription: Arc<dyn Disposable>) -> RegistrationId {
    self.subscriptions.register(subscription)
  }

  fn deregister_subscription(&self, id: RegistrationId) -> bool {
    self.subscriptions.deregister(id)
  }
}
