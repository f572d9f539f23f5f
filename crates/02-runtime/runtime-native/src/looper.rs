use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use message_channel::{Executor, Task};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// A dedicated thread draining a FIFO task queue.
///
/// Stops when [`shutdown`](Looper::shutdown) is called or the looper is
/// dropped; tasks submitted afterwards are discarded.
pub struct Looper {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Looper {
    /// Starts a looper thread called `name`.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(&thread_name, receiver))?;
        debug!(looper = %name, "looper started");
        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Thread name given at spawn time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when called from this looper's own thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Submits a closure. Equivalent to [`Executor::execute`].
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.execute(Box::new(task));
    }

    /// Blocks until every task submitted before this call has run.
    ///
    /// Returns false on timeout, after shutdown, or when called from the looper
    /// thread itself (which would wait on its own queue).
    pub fn sync(&self, timeout: Duration) -> bool {
        if self.is_current() {
            return false;
        }
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(Box::new(move || {
                    let _ = done_tx.send(());
                }))
                .is_ok(),
            None => false,
        };
        sent && done_rx.recv_timeout(timeout).is_ok()
    }

    /// Stops accepting tasks, lets queued ones finish, and joins the thread.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        let handle = self.thread.lock().take();
        match handle {
            Some(handle) if !self.is_current() => {
                if handle.join().is_err() {
                    warn!(looper = %self.name, "looper thread terminated abnormally");
                }
            }
            // Shutting down from inside a task: the loop exits once this task returns.
            _ => {}
        }
        debug!(looper = %self.name, "looper stopped");
    }
}

impl Executor for Looper {
    fn execute(&self, task: Task) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    debug!(looper = %self.name, "looper thread gone, dropping task");
                }
            }
            None => debug!(looper = %self.name, "looper shut down, dropping task"),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(name: &str, receiver: Receiver<Task>) {
    for task in receiver.iter() {
        trace!(looper = name, "running task");
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!(looper = name, "task panicked, looper continues");
        }
    }
}
