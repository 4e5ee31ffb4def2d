// src/fibers/host.rs

//! Fiber backed by a host-provided execution context.
//!
//! Marshals every action onto an injected callback-dispatch capability,
//! typically a GUI message loop adapter. The adapter itself lives outside
//! this crate; here it is only the opaque [`ExecutionContext`] the fiber is
//! built on. Each action runs through an executor gate so the fiber can be
//! quiesced at shutdown without racing in-flight host callbacks.

use std::sync::Arc;

use super::{ExecutionStrategy, Fiber};
use crate::context::{Action, ExecutionContext};
use crate::executor::{DefaultExecutor, Executor};

pub struct HostBacked {
  context: Arc<dyn ExecutionContext>,
  executor: Arc<DefaultExecutor>,
}

impl ExecutionStrategy for HostBacked {
  fn dispatch(&self, action: Action) {
    let executor = self.executor.clone();
    self.context.enqueue(Box::new(move || executor.execute(action)));
  }
}

/// Fiber that runs its actions on a host loop.
pub type HostFiber = Fiber<HostBacked>;

/// Creates a fiber over the injected host context.
pub fn host(context: Arc<dyn ExecutionContext>) -> Arc<HostFiber> {
  Fiber::with_strategy(HostBacked {
    context,
    executor: Arc::new(DefaultExecutor::new()),
  })
}

impl Fiber<HostBacked> {
  /// The gate actions pass through on the host loop. Disable it to drop
  /// not-yet-executed actions during shutdown.
  pub fn executor(&self) -> &DefaultExecutor {
    &self.strategy.executor
  }
}
