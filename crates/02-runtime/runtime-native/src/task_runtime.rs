use std::collections::VecDeque;

use message_channel::{Executor, Task};
use parking_lot::Mutex;
use tracing::trace;

/// Executor that only runs tasks when pumped.
///
/// Each [`run_tick`](TaskRuntime::run_tick) runs the tasks that were queued
/// when the tick began; work they submit waits for the next tick.
pub struct TaskRuntime {
    name: String,
    queue: Mutex<VecDeque<Task>>,
}

impl Default for TaskRuntime {
    fn default() -> Self {
        Self::new("task-runtime")
    }
}

impl TaskRuntime {
    /// Creates an empty runtime reporting `name` as its executor name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Tasks waiting for a tick.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs one batch and returns how many tasks ran.
    pub fn run_tick(&self) -> usize {
        let batch = self.queue.lock().len();
        let mut work = 0;
        for _ in 0..batch {
            // Pop one at a time so tasks may submit without deadlocking.
            let Some(task) = self.queue.lock().pop_front() else {
                break;
            };
            task();
            work += 1;
        }
        if work > 0 {
            trace!(runtime = %self.name, work, "tick complete");
        }
        work
    }

    /// Ticks until a tick finds nothing to do. Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let work = self.run_tick();
            if work == 0 {
                return total;
            }
            total += work;
        }
    }
}

impl Executor for TaskRuntime {
    fn execute(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
