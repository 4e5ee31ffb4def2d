// src/executor.rs

//! Batch execution with an enable/disable gate.
//!
//! Queues and fibers hand drained batches to an [`Executor`] rather than
//! running actions directly. The gate exists for shutdown: disabling the
//! executor quiesces a fiber without racing against callbacks that are
//! already in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::context::Action;

/// Executes drained batches of actions on the consuming thread.
pub trait Executor: Send + Sync {
  /// Executes every action in the batch, in order.
  fn execute_batch(&self, batch: Vec<Action>);

  /// Executes a single action.
  fn execute(&self, action: Action);
}

/// Default executor. When disabled, actions are silently dropped; this is the
/// only silent-drop path in the crate and is an explicit shutdown-time
/// configuration, not an error path.
pub struct DefaultExecutor {
  enabled: AtomicBool,
}

impl DefaultExecutor {
  pub fn new() -> Self {
    Self {
      enabled: AtomicBool::new(true),
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::Acquire)
  }

  /// Gates execution. Actions executed while disabled are dropped.
  pub fn set_enabled(&self, enabled: bool) {
    self.enabled.store(enabled, Ordering::Release);
  }
}

impl Default for DefaultExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl Executor for DefaultExecutor {
  fn execute_batch(&self, batch: Vec<Action>) {
    for action in batch {
      self.execute(action);
    }
  }

  fn execute(&self, action: Action) {
    if self.is_enabled() {
      action();
    }
  }
}

struct PauseState {
  paused: bool,
  held: VecDeque<Action>,
}

/// Executor that can additionally be paused.
///
/// While paused, incoming actions are held in arrival order instead of
/// executed. On resume the held actions run at the head of the next executing
/// call, so replay happens on the consuming thread and serial order is
/// preserved. An optional first action supplied to [`resume`](Self::resume)
/// runs before the held backlog.
pub struct PausableExecutor {
  enabled: AtomicBool,
  state: Mutex<PauseState>,
}

impl PausableExecutor {
  pub fn new() -> Self {
    Self {
      enabled: AtomicBool::new(true),
      state: Mutex::new(PauseState {
        paused: false,
        held: VecDeque::new(),
      }),
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::Acquire)
  }

  pub fn set_enabled(&self, enabled: bool) {
    self.enabled.store(enabled, Ordering::Release);
  }

  pub fn is_paused(&self) -> bool {
    self.state.lock().paused
  }

  /// Starts holding actions instead of executing them. Callbacks already in
  /// flight are unaffected.
  pub fn pause(&self) {
    self.state.lock().paused = true;
  }

  /// Stops holding. `first`, if supplied, is placed ahead of the held
  /// backlog.
  pub fn resume(&self, first: Option<Action>) {
    let mut state = self.state.lock();
    state.paused = false;
    if let Some(action) = first {
      state.held.push_front(action);
    }
  }

  fn run(&self, action: Action) {
    if self.is_enabled() {
      action();
    }
  }
}

impl Default for PausableExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl Executor for PausableExecutor {
  fn execute_batch(&self, batch: Vec<Action>) {
    for action in batch {
      self.execute(action);
    }
  }

  fn execute(&self, action: Action) {
    let backlog = {
      let mut state = self.state.lock();
      if state.paused {
        state.held.push_back(action);
        return;
      }
      if state.held.is_empty() {
        drop(state);
        self.run(action);
        return;
      }
      // Just resumed: drain the backlog ahead of the new action.
      state.held.push_back(action);
      std::mem::take(&mut state.held)
    };
    for action in backlog {
      self.run(action);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Arc;

  fn counting_action(counter: &Arc<AtomicUsize>) -> Action {
    let counter = counter.clone();
    Box::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn disabled_executor_drops_actions() {
    let executor = DefaultExecutor::new();
    let count = Arc::new(AtomicUsize::new(0));

    executor.execute(counting_action(&count));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    executor.set_enabled(false);
    executor.execute(counting_action(&count));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    executor.set_enabled(true);
    executor.execute(counting_action(&count));
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn paused_executor_holds_and_replays_in_order() {
    let executor = PausableExecutor::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let record = |tag: u32| {
      let order = order.clone();
      let action: Action = Box::new(move || order.lock().push(tag));
      action
    };

    executor.pause();
    executor.execute(record(1));
    executor.execute(record(2));
    assert!(order.lock().is_empty());

    executor.resume(None);
    executor.execute(record(3));
    assert_eq!(*order.lock(), vec![1, 2, 3]);
  }

  #[test]
  fn resume_first_action_runs_ahead_of_backlog() {
    let executor = PausableExecutor::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let record = |tag: u32| {
      let order = order.clone();
      let action: Action = Box::new(move || order.lock().push(tag));
      action
    };

    executor.pause();
    executor.execute(record(2));
    executor.resume(Some(record(1)));
    executor.execute(record(3));
    assert_eq!(*order.lock(), vec![1, 2, 3]);
  }
}
