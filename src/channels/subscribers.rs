// src/channels/subscribers.rs

//! The four subscription delivery strategies.
//!
//! Each receives on the producer thread, applies the optional filter, and
//! controls when work crosses onto the target fiber: immediately, at the end
//! of a batching window, keyed-last within a window, or coalesced to the
//! single latest value. Batch state is guarded by the subscriber's own lock;
//! a flush-scheduled flag ensures at most one outstanding flush timer per
//! window.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::channel::ProducerThreadReceiver;
use crate::fibers::FiberContext;

/// Producer-side admission filter. Runs on whichever thread publishes, so it
/// must be safe to call from multiple threads concurrently.
pub type MessageFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

fn passes<T>(filter: &Option<MessageFilter<T>>, msg: &T) -> bool {
  filter.as_ref().map_or(true, |filter| filter(msg))
}

/// Immediate delivery: every admitted message is enqueued onto the target
/// fiber as its own callback.
pub struct ChannelSubscription<T> {
  fiber: Arc<dyn FiberContext>,
  receiver: Arc<dyn Fn(T) + Send + Sync>,
  filter: Option<MessageFilter<T>>,
}

impl<T> ChannelSubscription<T> {
  pub fn new(
    fiber: Arc<dyn FiberContext>,
    receiver: impl Fn(T) + Send + Sync + 'static,
  ) -> Self {
    Self {
      fiber,
      receiver: Arc::new(receiver),
      filter: None,
    }
  }

  pub fn with_filter(
    fiber: Arc<dyn FiberContext>,
    receiver: impl Fn(T) + Send + Sync + 'static,
    filter: MessageFilter<T>,
  ) -> Self {
    Self {
      fiber,
      receiver: Arc::new(receiver),
      filter: Some(filter),
    }
  }
}

impl<T> ProducerThreadReceiver<T> for ChannelSubscription<T>
where
  T: Send + 'static,
{
  fn receive_on_producer_thread(&self, msg: T) {
    if !passes(&self.filter, &msg) {
      return;
    }
    let receiver = self.receiver.clone();
    self.fiber.enqueue(Box::new(move || receiver(msg)));
  }
}

/// Time-batched delivery: messages accumulate in arrival order; the first
/// message of a window schedules one flush, delivered as a single callback.
pub struct BatchSubscriber<T> {
  fiber: Arc<dyn FiberContext>,
  receiver: Arc<dyn Fn(Vec<T>) + Send + Sync>,
  interval: Duration,
  pending: Arc<Mutex<Option<Vec<T>>>>,
  filter: Option<MessageFilter<T>>,
}

impl<T> BatchSubscriber<T> {
  pub fn new(
    fiber: Arc<dyn FiberContext>,
    receiver: impl Fn(Vec<T>) + Send + Sync + 'static,
    interval: Duration,
  ) -> Self {
    Self {
      fiber,
      receiver: Arc::new(receiver),
      interval,
      pending: Arc::new(Mutex::new(None)),
      filter: None,
    }
  }

  pub fn set_filter(&mut self, filter: MessageFilter<T>) {
    self.filter = Some(filter);
  }
}

impl<T> ProducerThreadReceiver<T> for BatchSubscriber<T>
where
  T: Send + 'static,
{
  fn receive_on_producer_thread(&self, msg: T) {
    if !passes(&self.filter, &msg) {
      return;
    }
    let mut pending = self.pending.lock();
    match pending.as_mut() {
      Some(batch) => batch.push(msg),
      None => {
        *pending = Some(vec![msg]);
        // First message of the window: arm the one flush.
        let pending = self.pending.clone();
        let receiver = self.receiver.clone();
        self.fiber.schedule(
          Arc::new(move || {
            let batch = pending.lock().take();
            if let Some(batch) = batch {
              receiver(batch);
            }
          }),
          self.interval,
        );
      }
    }
  }
}

/// Keyed-last-batched delivery: within a window, a later message with the
/// same key overwrites the earlier one; the flush delivers the key→latest
/// map.
pub struct KeyedBatchSubscriber<K, T> {
  fiber: Arc<dyn FiberContext>,
  key_of: Arc<dyn Fn(&T) -> K + Send + Sync>,
  receiver: Arc<dyn Fn(HashMap<K, T>) + Send + Sync>,
  interval: Duration,
  pending: Arc<Mutex<Option<HashMap<K, T>>>>,
  filter: Option<MessageFilter<T>>,
}

impl<K, T> KeyedBatchSubscriber<K, T>
where
  K: Eq + Hash,
{
  pub fn new(
    fiber: Arc<dyn FiberContext>,
    key_of: impl Fn(&T) -> K + Send + Sync + 'static,
    receiver: impl Fn(HashMap<K, T>) + Send + Sync + 'static,
    interval: Duration,
  ) -> Self {
    Self {
      fiber,
      key_of: Arc::new(key_of),
      receiver: Arc::new(receiver),
      interval,
      pending: Arc::new(Mutex::new(None)),
      filter: None,
    }
  }

  pub fn set_filter(&mut self, filter: MessageFilter<T>) {
    self.filter = Some(filter);
  }
}

impl<K, T> ProducerThreadReceiver<T> for KeyedBatchSubscriber<K, T>
where
  K: Eq + Hash + Send + 'static,
  T: Send + 'static,
{
  fn receive_on_producer_thread(&self, msg: T) {
    if !passes(&self.filter, &msg) {
      return;
    }
    let key = (self.key_of)(&msg);
    let mut pending = self.pending.lock();
    match pending.as_mut() {
      Some(map) => {
        map.insert(key, msg);
      }
      None => {
        let mut map = HashMap::new();
        map.insert(key, msg);
        *pending = Some(map);
        let pending = self.pending.clone();
        let receiver = self.receiver.clone();
        self.fiber.schedule(
          Arc::new(move || {
            let map = pending.lock().take();
            if let Some(map) = map {
              receiver(map);
            }
          }),
          self.interval,
        );
      }
    }
  }
}

struct LastSlot<T> {
  flush_pending: bool,
  value: Option<T>,
}

/// Coalesced-last delivery: only the single most recent message survives a
/// window; exactly one flush timer is armed regardless of message count.
pub struct LastSubscriber<T> {
  fiber: Arc<dyn FiberContext>,
  receiver: Arc<dyn Fn(T) + Send + Sync>,
  interval: Duration,
  slot: Arc<Mutex<LastSlot<T>>>,
  filter: Option<MessageFilter<T>>,
}

impl<T> LastSubscriber<T> {
  pub fn new(
    fiber: Arc<dyn FiberContext>,
    receiver: impl Fn(T) + Send + Sync + 'static,
    interval: Duration,
  ) -> Self {
    Self {
      fiber,
      receiver: Arc::new(receiver),
      interval,
      slot: Arc::new(Mutex::new(LastSlot {
        flush_pending: false,
        value: None,
      })),
      filter: None,
    }
  }

  pub fn set_filter(&mut self, filter: MessageFilter<T>) {
    self.filter = Some(filter);
  }
}

impl<T> ProducerThreadReceiver<T> for LastSubscriber<T>
where
  T: Send + 'static,
{
  fn receive_on_producer_thread(&self, msg: T) {
    if !passes(&self.filter, &msg) {
      return;
    }
    let mut slot = self.slot.lock();
    if !slot.flush_pending {
      slot.flush_pending = true;
      let slot = self.slot.clone();
      let receiver = self.receiver.clone();
      self.fiber.schedule(
        Arc::new(move || {
          let value = {
            let mut slot = slot.lock();
            slot.flush_pending = false;
            slot.value.take()
          };
          if let Some(value) = value {
            receiver(value);
          }
        }),
        self.interval,
      );
    }
    slot.value = Some(msg);
  }
}
