#![deny(missing_docs)]
//! Native execution contexts for message-port callbacks.
//!
//! * [`Looper`] owns a named thread and runs submitted tasks in order.
//! * [`TaskRuntime`] queues tasks until the caller pumps it, for deterministic tests.

mod looper;
mod task_runtime;

pub use looper::Looper;
pub use task_runtime::TaskRuntime;
