// src/channels/snapshot.rs

//! Snapshot-then-updates channel.
//!
//! A subscriber first *primes*: it requests a full snapshot over an internal
//! request/reply channel, delivers it synchronously, and only then joins the
//! incremental update channel. An update published between the snapshot reply
//! and the update subscription is not observed by the new subscriber; see
//! `tests/snapshot.rs` where this window is documented.

use std::sync::Arc;
use std::time::Duration;

use super::channel::Channel;
use super::request_reply::RequestReplyChannel;
use crate::context::Disposable;
use crate::error::PrimingError;
use crate::fibers::FiberContext;

/// Channel transmitting an initial snapshot followed by incremental updates.
pub struct SnapshotChannel<T> {
  timeout: Duration,
  updates: Channel<T>,
  requests: RequestReplyChannel<(), T>,
}

impl<T> SnapshotChannel<T>
where
  T: Clone + Send + 'static,
{
  /// `timeout` bounds the wait for the initial snapshot.
  pub fn new(timeout: Duration) -> Self {
    Self {
      timeout,
      updates: Channel::new(),
      requests: RequestReplyChannel::new(),
    }
  }

  /// Fetches the snapshot, delivers it synchronously to `receive`, then
  /// subscribes `receive` to updates on `fiber`.
  ///
  /// Fails with [`PrimingError`] when nobody answers priming requests or the
  /// reply does not arrive in time; no partial subscription is left active.
  pub fn primed_subscribe<F>(
    &self,
    fiber: &Arc<F>,
    receive: impl Fn(T) + Send + Sync + 'static,
  ) -> Result<Arc<dyn Disposable>, PrimingError>
  where
    F: FiberContext + 'static,
  {
    let reply = self
      .requests
      .send_request(())
      .ok_or(PrimingError::NoReplySubscriber)?;
    let snapshot = reply.receive(self.timeout);
    reply.dispose();
    let snapshot = match snapshot {
      Some(snapshot) => snapshot,
      None => return Err(PrimingError::TimedOut(self.timeout)),
    };

    let receive = Arc::new(receive);
    receive(snapshot);
    let updates = receive.clone();
    Ok(self.updates.subscribe(fiber, move |update| updates(update)))
  }

  /// Publishes an incremental update to every primed subscriber.
  pub fn publish(&self, update: T) -> bool {
    self.updates.publish(update)
  }

  /// Registers `supplier` to answer priming requests on `fiber`.
  pub fn reply_to_priming_request<F>(
    &self,
    fiber: &Arc<F>,
    supplier: impl Fn() -> T + Send + Sync + 'static,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    self.requests.subscribe(fiber, move |request| {
      request.send_reply(supplier());
    })
  }
}
