// src/context.rs

//! Core vocabulary: the unit of work and the capabilities everything else is
//! built from.

use std::sync::Arc;

/// A deferred, side-effecting unit of work. Captured by value at enqueue time
/// and executed at most once per enqueue.
pub type Action = Box<dyn FnOnce() + Send>;

/// A unit of work a timer may invoke repeatedly (recurring schedules re-fire
/// the same task).
pub type ScheduledTask = Arc<dyn Fn() + Send + Sync>;

/// Capability to accept work for later execution. Implemented by every fiber
/// variant and by host-thread adapters supplied from outside the crate.
pub trait ExecutionContext: Send + Sync {
  /// Adds an action to be executed on this context's serial stream.
  fn enqueue(&self, action: Action);
}

/// A cancellation handle. `dispose` is thread-safe and idempotent: it only
/// prevents *future* delivery and never interrupts work that has already been
/// dispatched.
pub trait Disposable: Send + Sync {
  fn dispose(&self);
}
