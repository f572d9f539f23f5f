use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Thread-safe append-only log that callers can block on.
pub struct Collector<T> {
    items: Mutex<Vec<T>>,
    changed: Condvar,
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            changed: Condvar::new(),
        }
    }
}

impl<T: Clone> Collector<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
        self.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    /// Waits until at least `count` items arrived. Returns whatever is there on timeout.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<T> {
        self.wait_until(|items| items.len() >= count, timeout)
    }

    /// Waits until `done` holds for the collected items or `timeout` elapses.
    pub fn wait_until(&self, done: impl Fn(&[T]) -> bool, timeout: Duration) -> Vec<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        while !done(&items) {
            if self.changed.wait_until(&mut items, deadline).timed_out() {
                break;
            }
        }
        items.clone()
    }
}
