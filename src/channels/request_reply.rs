// src/channels/request_reply.rs

//! Synchronous and asynchronous request/reply over a channel.
//!
//! A request and its reply inbox are one shared object: the subscriber side
//! answers through [`ChannelRequest::send_reply`], the requester side blocks
//! in [`ChannelRequest::receive`]. Multiple subscribers may each answer, so
//! the inbox is a FIFO of responses rather than a single slot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::channel::Channel;
use crate::context::Disposable;
use crate::fibers::FiberContext;

struct ReplyState<M> {
  responses: VecDeque<M>,
  disposed: bool,
}

/// A request envelope paired with its thread-safe reply inbox.
pub struct ChannelRequest<R, M> {
  request: R,
  state: Mutex<ReplyState<M>>,
  arrived: Condvar,
}

impl<R, M> ChannelRequest<R, M> {
  fn new(request: R) -> Self {
    Self {
      request,
      state: Mutex::new(ReplyState {
        responses: VecDeque::new(),
        disposed: false,
      }),
      arrived: Condvar::new(),
    }
  }

  /// The request payload.
  pub fn request(&self) -> &R {
    &self.request
  }

  /// Delivers a reply. Returns `false` if the requester already disposed the
  /// handle; this is an expected race during teardown, not an error.
  pub fn send_reply(&self, response: M) -> bool {
    let mut state = self.state.lock();
    if state.disposed {
      return false;
    }
    state.responses.push_back(response);
    self.arrived.notify_all();
    true
  }

  /// Blocks until a reply arrives, the timeout elapses, or the handle is
  /// disposed. Replies queued before disposal remain receivable.
  pub fn receive(&self, timeout: Duration) -> Option<M> {
    let deadline = Instant::now() + timeout;
    let mut state = self.state.lock();
    loop {
      if let Some(response) = state.responses.pop_front() {
        return Some(response);
      }
      if state.disposed {
        return None;
      }
      if self.arrived.wait_until(&mut state, deadline).timed_out() {
        return state.responses.pop_front();
      }
    }
  }

  /// Stops further delivery and wakes any blocked receiver with a negative
  /// result.
  pub fn dispose(&self) {
    let mut state = self.state.lock();
    state.disposed = true;
    self.arrived.notify_all();
  }
}

impl<R, M> Disposable for ChannelRequest<R, M>
where
  R: Send + Sync,
  M: Send,
{
  fn dispose(&self) {
    ChannelRequest::dispose(self);
  }
}

/// Channel carrying request/reply envelopes.
pub struct RequestReplyChannel<R, M> {
  requests: Channel<Arc<ChannelRequest<R, M>>>,
}

impl<R, M> Default for RequestReplyChannel<R, M>
where
  R: Send + Sync + 'static,
  M: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<R, M> RequestReplyChannel<R, M>
where
  R: Send + Sync + 'static,
  M: Send + 'static,
{
  pub fn new() -> Self {
    Self {
      requests: Channel::new(),
    }
  }

  /// Subscribes `on_request` to answer requests on `fiber`.
  pub fn subscribe<F>(
    &self,
    fiber: &Arc<F>,
    on_request: impl Fn(Arc<ChannelRequest<R, M>>) + Send + Sync + 'static,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    self.requests.subscribe(fiber, on_request)
  }

  /// Publishes a request to any and all subscribers. Returns `None` when no
  /// subscriber is registered, since nothing could reply.
  pub fn send_request(&self, request: R) -> Option<Arc<ChannelRequest<R, M>>> {
    let request = Arc::new(ChannelRequest::new(request));
    if self.requests.publish(request.clone()) {
      Some(request)
    } else {
      None
    }
  }
}
