// src/error.rs

use core::fmt;
use std::time::Duration;

/// Error returned when a bounded queue could not make space for a new action
/// before the producer's wait budget elapsed.
///
/// The caller decides whether to retry, drop, or back off; the queue never
/// retries internally.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct QueueFull {
  /// Queue depth observed at the time the enqueue was rejected.
  pub depth: usize,
}

impl std::error::Error for QueueFull {}
impl fmt::Display for QueueFull {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "attempted to enqueue onto a full queue (depth {})", self.depth)
  }
}

/// Error returned by `SnapshotChannel::primed_subscribe` when the priming
/// handshake could not complete. No partial subscription is left behind.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PrimingError {
  /// Nobody is subscribed to answer priming requests.
  NoReplySubscriber,
  /// The reply subscriber did not answer within the channel's timeout.
  TimedOut(Duration),
}

impl std::error::Error for PrimingError {}
impl fmt::Display for PrimingError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PrimingError::NoReplySubscriber => {
        write!(f, "priming request has no reply subscriber")
      }
      PrimingError::TimedOut(timeout) => {
        write!(f, "priming request timed out after {:?}", timeout)
      }
    }
  }
}
