// src/registry.rs

//! Lifecycle registry for disposables owned by a fiber.
//!
//! Subscriptions and similar tokens register here so that tearing a fiber
//! down disposes everything still outstanding. Registration ids make disposal
//! an index invalidation: removing an id twice, or an id that was already
//! swept by teardown, is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Disposable;

/// Identifies one registration within a [`Subscriptions`] registry.
pub type RegistrationId = u64;

/// Thread-safe registry of disposables.
///
/// Teardown swaps the whole item list out under the lock, so a registration
/// racing with [`dispose_all`](Self::dispose_all) is either swept by the
/// teardown or disposed immediately on arrival; it can never be silently
/// lost.
pub struct Subscriptions {
  next_id: AtomicU64,
  items: Mutex<Option<Vec<(RegistrationId, Arc<dyn Disposable>)>>>,
}

impl Subscriptions {
  pub fn new() -> Self {
    Self {
      next_id: AtomicU64::new(1),
      items: Mutex::new(Some(Vec::new())),
    }
  }

  /// Number of currently registered disposables.
  pub fn count(&self) -> usize {
    self.items.lock().as_ref().map_or(0, Vec::len)
  }

  /// Adds a disposable, returning its registration id.
  ///
  /// If the registry has already been torn down the item is disposed before
  /// this returns.
  pub fn register(&self, item: Arc<dyn Disposable>) -> RegistrationId {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let late = {
      let mut items = self.items.lock();
      match items.as_mut() {
        Some(items) => {
          items.push((id, item));
          None
        }
        None => Some(item),
      }
    };
    if let Some(item) = late {
      item.dispose();
    }
    id
  }

  /// Removes a registration. Returns whether the id was still present.
  pub fn deregister(&self, id: RegistrationId) -> bool {
    let mut items = self.items.lock();
    match items.as_mut() {
      Some(items) => {
        let before = items.len();
        items.retain(|(item_id, _)| *item_id != id);
        items.len() != before
      }
      None => false,
    }
  }

  /// Disposes every registered item and closes the registry. Later
  /// registrations are disposed on arrival.
  pub fn dispose_all(&self) {
    let drained = self.items.lock().take();
    if let Some(drained) = drained {
      for (_, item) in drained {
        item.dispose();
      }
    }
  }
}

impl Default for Subscriptions {
  fn default() -> Self {
    Self::new()
  }
}
