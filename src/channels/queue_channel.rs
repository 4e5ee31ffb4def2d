// src/channels/queue_channel.rs

//! Competing-consumer work queue.
//!
//! Unlike [`Channel`](super::Channel)'s broadcast, every published message
//! goes to exactly one of the subscribed consumers. Publish enqueues onto one
//! shared FIFO and signals all consumers; each consumer keeps its own
//! flush-pending flag so at most one consume callback is in flight per
//! consumer, and consumers cooperatively drain whatever is first available.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context::{Disposable, ExecutionContext};

pub(crate) struct QueueShared<T> {
  queue: Mutex<VecDeque<T>>,
  consumers: Mutex<Arc<Vec<(u64, Arc<QueueConsumer<T>>)>>>,
  next_id: AtomicU64,
}

impl<T> QueueShared<T> {
  fn remove(&self, id: u64) {
    let mut consumers = self.consumers.lock();
    let next: Vec<(u64, Arc<QueueConsumer<T>>)> = consumers
      .iter()
      .filter(|(consumer_id, _)| *consumer_id != id)
      .cloned()
      .collect();
    *consumers = Arc::new(next);
  }
}

/// Work queue with once-and-only-once delivery to the first available
/// consumer.
pub struct QueueChannel<T> {
  shared: Arc<QueueShared<T>>,
}

impl<T> Clone for QueueChannel<T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<T> Default for QueueChannel<T>
where
  T: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<T> QueueChannel<T>
where
  T: Send + 'static,
{
  pub fn new() -> Self {
    Self {
      shared: Arc::new(QueueShared {
        queue: Mutex::new(VecDeque::new()),
        consumers: Mutex::new(Arc::new(Vec::new())),
        next_id: AtomicU64::new(1),
      }),
    }
  }

  /// Number of undelivered messages.
  pub fn len(&self) -> usize {
    self.shared.queue.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.queue.lock().is_empty()
  }

  /// Enqueues the message and signals every subscribed consumer.
  pub fn publish(&self, message: T) {
    self.shared.queue.lock().push_back(message);
    let snapshot = self.shared.consumers.lock().clone();
    for (_, consumer) in snapshot.iter() {
      QueueConsumer::signal(consumer);
    }
  }

  /// Adds a competing consumer delivering onto `context`. The token detaches
  /// the consumer from further signals; a consume callback already enqueued
  /// may still deliver one message.
  pub fn subscribe<C>(
    &self,
    context: &Arc<C>,
    on_message: impl Fn(T) + Send + Sync + 'static,
  ) -> Arc<dyn Disposable>
  where
    C: ExecutionContext + 'static,
  {
    let target: Arc<dyn ExecutionContext> = context.clone();
    let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
    let consumer = Arc::new(QueueConsumer {
      id,
      detached: AtomicBool::new(false),
      flush_pending: Mutex::new(false),
      target,
      callback: Arc::new(on_message),
      channel: Arc::downgrade(&self.shared),
    });

    let mut consumers = self.shared.consumers.lock();
    let mut next = consumers.as_ref().clone();
    next.push((id, consumer.clone()));
    *consumers = Arc::new(next);
    consumer
  }
}

pub(crate) struct QueueConsumer<T> {
  id: u64,
  detached: AtomicBool,
  flush_pending: Mutex<bool>,
  target: Arc<dyn ExecutionContext>,
  callback: Arc<dyn Fn(T) + Send + Sync>,
  channel: Weak<QueueShared<T>>,
}

impl<T> QueueConsumer<T>
where
  T: Send + 'static,
{
  fn signal(this: &Arc<Self>) {
    {
      let mut flush_pending = this.flush_pending.lock();
      if *flush_pending {
        return;
      }
      *flush_pending = true;
    }
    // Enqueue outside the flag lock: the target context may run the consume
    // callback synchronously (stub fibers do).
    let me = this.clone();
    this.target.enqueue(Box::new(move || QueueConsumer::consume_next(&me)));
  }

  fn consume_next(this: &Arc<Self>) {
    let Some(shared) = this.channel.upgrade() else {
      *this.flush_pending.lock() = false;
      return;
    };
    let message = shared.queue.lock().pop_front();
    if let Some(message) = message {
      (this.callback)(message);
    }
    let keep_draining = {
      let mut flush_pending = this.flush_pending.lock();
      if shared.queue.lock().is_empty() {
        *flush_pending = false;
        false
      } else {
        true
      }
    };
    if keep_draining {
      let me = this.clone();
      this.target.enqueue(Box::new(move || QueueConsumer::consume_next(&me)));
    }
  }
}

impl<T> Disposable for QueueConsumer<T>
where
  T: Send + 'static,
{
  fn dispose(&self) {
    if self.detached.swap(true, Ordering::AcqRel) {
      return;
    }
    if let Some(shared) = self.channel.upgrade() {
      shared.remove(self.id);
    }
  }
}
