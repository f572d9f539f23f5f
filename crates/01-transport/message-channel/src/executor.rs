//! Execution contexts that receive callbacks run on.
//!
//! An [`Executor`] must run tasks in submission order; per-port FIFO delivery
//! relies on it. Thread-backed and manually pumped executors live in
//! `runtime-native`.

use std::cell::RefCell;
use std::collections::VecDeque;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync + 'static {
    /// Queues `task` for execution. Tasks submitted from one thread run in submission order.
    fn execute(&self, task: Task);

    fn name(&self) -> &str {
        "executor"
    }
}

thread_local! {
    static TRAMPOLINE: RefCell<Option<VecDeque<Task>>> = const { RefCell::new(None) };
}

/// Runs tasks on the submitting thread.
///
/// Nested submissions (a task that submits more work) are queued behind the
/// running task instead of recursing, so every task runs to completion before
/// the next one starts.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        let first = TRAMPOLINE.with(|slot| {
            let mut slot = slot.borrow_mut();
            match slot.as_mut() {
                Some(queue) => {
                    queue.push_back(task);
                    None
                }
                None => {
                    *slot = Some(VecDeque::new());
                    Some(task)
                }
            }
        });
        let Some(first) = first else {
            return;
        };

        let _reset = TrampolineReset;
        first();
        while let Some(next) = TRAMPOLINE.with(|slot| slot.borrow_mut().as_mut()?.pop_front()) {
            next();
        }
    }

    fn name(&self) -> &str {
        "inline"
    }
}

struct TrampolineReset;

impl Drop for TrampolineReset {
    fn drop(&mut self) {
        TRAMPOLINE.with(|slot| slot.borrow_mut().take());
    }
}
