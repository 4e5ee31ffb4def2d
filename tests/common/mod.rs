#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use strand::{Action, ThreadPool};

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_HIGH: usize = 1000;

/// Minimal injected pool: every job gets its own thread. The pool fiber's
/// flush loop still serializes execution, so this is a valid backing.
pub struct SpawnPool;

impl ThreadPool for SpawnPool {
  fn queue(&self, job: Action) {
    thread::spawn(job);
  }
}

/// Installs the test logger once; safe to call from every test.
pub fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
  let start = Instant::now();
  while start.elapsed() < timeout {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(1));
  }
  condition()
}
