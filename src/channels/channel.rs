// src/channels/channel.rs

//! The broadcast channel and its subscription entry points.
//!
//! The subscriber set is a copy-on-write snapshot: `publish` clones the
//! current `Arc` of the set and invokes it outside any lock, so a subscriber
//! added or removed concurrently never affects an in-flight publish and
//! publishing never blocks on subscription churn.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::subscribers::{
  BatchSubscriber, ChannelSubscription, KeyedBatchSubscriber, LastSubscriber,
};
use crate::context::Disposable;
use crate::fibers::FiberContext;
use crate::registry::RegistrationId;

/// A callback invoked on whichever thread publishes; must be safe to call
/// from multiple producer threads concurrently. The built-in subscription
/// strategies implement this; custom implementations plug in through
/// [`Channel::subscribe_on_producer_threads`].
pub trait ProducerThreadReceiver<T>: Send + Sync {
  fn receive_on_producer_thread(&self, msg: T);
}

struct SubscriberEntry<T> {
  id: u64,
  receiver: Arc<dyn ProducerThreadReceiver<T>>,
}

impl<T> Clone for SubscriberEntry<T> {
  fn clone(&self) -> Self {
    Self {
      id: self.id,
      receiver: self.receiver.clone(),
    }
  }
}

pub(crate) struct ChannelShared<T> {
  subscribers: Mutex<Arc<Vec<SubscriberEntry<T>>>>,
  next_id: AtomicU64,
}

impl<T> ChannelShared<T> {
  fn add(&self, receiver: Arc<dyn ProducerThreadReceiver<T>>) -> u64 {
    let mut subscribers = self.subscribers.lock();
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let mut next = subscribers.as_ref().clone();
    next.push(SubscriberEntry { id, receiver });
    *subscribers = Arc::new(next);
    id
  }

  pub(crate) fn remove(&self, id: u64) {
    let mut subscribers = self.subscribers.lock();
    if !subscribers.iter().any(|entry| entry.id == id) {
      return;
    }
    let next: Vec<SubscriberEntry<T>> = subscribers
      .iter()
      .filter(|entry| entry.id != id)
      .cloned()
      .collect();
    *subscribers = Arc::new(next);
  }
}

/// Typed pub/sub bus. Cloning shares the same subscriber set.
pub struct Channel<T> {
  shared: Arc<ChannelShared<T>>,
}

impl<T> Clone for Channel<T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<T> Default for Channel<T>
where
  T: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Channel<T>
where
  T: Send + 'static,
{
  pub fn new() -> Self {
    Self {
      shared: Arc::new(ChannelShared {
        subscribers: Mutex::new(Arc::new(Vec::new())),
        next_id: AtomicU64::new(1),
      }),
    }
  }

  pub fn has_subscribers(&self) -> bool {
    !self.shared.subscribers.lock().is_empty()
  }

  pub fn subscriber_count(&self) -> usize {
    self.shared.subscribers.lock().len()
  }

  /// Invokes the current subscriber snapshot synchronously on the calling
  /// thread. Returns whether any subscriber existed.
  pub fn publish(&self, msg: T) -> bool
  where
    T: Clone,
  {
    let snapshot = self.shared.subscribers.lock().clone();
    if snapshot.is_empty() {
      return false;
    }
    for entry in snapshot.iter() {
      entry.receiver.receive_on_producer_thread(msg.clone());
    }
    true
  }

  /// Removes every subscriber without disposing their tokens.
  pub fn clear_subscribers(&self) {
    *self.shared.subscribers.lock() = Arc::new(Vec::new());
  }

  /// Delivers every message to `receive` on `fiber`, preserving
  /// per-subscriber order.
  pub fn subscribe<F>(
    &self,
    fiber: &Arc<F>,
    receive: impl Fn(T) + Send + Sync + 'static,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    let fiber_context: Arc<dyn FiberContext> = fiber.clone();
    self.subscribe_on_producer_threads(
      Arc::new(ChannelSubscription::new(fiber_context, receive)),
      fiber,
    )
  }

  /// Accumulates messages and delivers them as one batch on `fiber` after
  /// `interval`, arming at most one flush per window.
  pub fn subscribe_to_batch<F>(
    &self,
    fiber: &Arc<F>,
    receive: impl Fn(Vec<T>) + Send + Sync + 'static,
    interval: Duration,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    let fiber_context: Arc<dyn FiberContext> = fiber.clone();
    self.subscribe_on_producer_threads(
      Arc::new(BatchSubscriber::new(fiber_context, receive, interval)),
      fiber,
    )
  }

  /// Like [`subscribe_to_batch`](Self::subscribe_to_batch), but a later
  /// message with the same key replaces the earlier one within a window.
  pub fn subscribe_to_keyed_batch<K, F>(
    &self,
    fiber: &Arc<F>,
    key_of: impl Fn(&T) -> K + Send + Sync + 'static,
    receive: impl Fn(HashMap<K, T>) + Send + Sync + 'static,
    interval: Duration,
  ) -> Arc<dyn Disposable>
  where
    K: Eq + Hash + Send + 'static,
    F: FiberContext + 'static,
  {
    let fiber_context: Arc<dyn FiberContext> = fiber.clone();
    self.subscribe_on_producer_threads(
      Arc::new(KeyedBatchSubscriber::new(
        fiber_context,
        key_of,
        receive,
        interval,
      )),
      fiber,
    )
  }

  /// Delivers only the most recent message per window. If a newer message
  /// arrives before the flush, the pending one is replaced and discarded.
  pub fn subscribe_to_last<F>(
    &self,
    fiber: &Arc<F>,
    receive: impl Fn(T) + Send + Sync + 'static,
    interval: Duration,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    let fiber_context: Arc<dyn FiberContext> = fiber.clone();
    self.subscribe_on_producer_threads(
      Arc::new(LastSubscriber::new(fiber_context, receive, interval)),
      fiber,
    )
  }

  /// Adds a custom producer-thread receiver and registers the unsubscription
  /// token with `fiber`'s registry so fiber teardown sweeps it.
  pub fn subscribe_on_producer_threads<F>(
    &self,
    receiver: Arc<dyn ProducerThreadReceiver<T>>,
    fiber: &Arc<F>,
  ) -> Arc<dyn Disposable>
  where
    F: FiberContext + 'static,
  {
    let entry_id = self.shared.add(receiver);
    let fiber_dyn: Arc<dyn FiberContext> = fiber.clone();
    let fiber_ref: Weak<dyn FiberContext> = Arc::downgrade(&fiber_dyn);
    let unsubscriber = Arc::new(Unsubscriber {
      disposed: AtomicBool::new(false),
      channel: Arc::downgrade(&self.shared),
      entry_id,
      fiber: fiber_ref,
      registration: Mutex::new(None),
    });
    let registration = fiber.register_subscription(unsubscriber.clone());
    *unsubscriber.registration.lock() = Some(registration);
    unsubscriber
  }
}

/// Token removing one subscription from its channel and its fiber's registry.
/// Both removals are idempotent.
struct Unsubscriber<T> {
  disposed: AtomicBool,
  channel: Weak<ChannelShared<T>>,
  entry_id: u64,
  fiber: Weak<dyn FiberContext>,
  registration: Mutex<Option<RegistrationId>>,
}

impl<T> Disposable for Unsubscriber<T>
where
  T: Send,
{
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    if let Some(channel) = self.channel.upgrade() {
      channel.remove(self.entry_id);
    }
    let registration = *self.registration.lock();
    if let (Some(fiber), Some(registration)) = (self.fiber.upgrade(), registration) {
      fiber.deregister_subscription(registration);
    }
  }
}
