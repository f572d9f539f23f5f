//! Queue draining.
//!
//! At most one drain task per endpoint is in flight (`dispatch_scheduled`).
//! A drain delivers up to the hub's dispatch budget, then re-submits itself
//! so one busy port cannot monopolise a shared executor.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::endpoint::{Endpoint, EndpointInner};
use crate::executor::Executor;
use crate::metrics::DeliveryOutcome;
use crate::payload::QueuedMessage;
use crate::port::{MessageCallback, PortState};

/// Marks a drain as scheduled if there is work and a receiver to do it.
pub(crate) fn claim(inner: &mut EndpointInner) -> Option<(Arc<dyn Executor>, u64)> {
    if inner.dispatch_scheduled || inner.queue.is_empty() {
        return None;
    }
    let executor = Arc::clone(&inner.receiver.as_ref()?.executor);
    inner.dispatch_scheduled = true;
    Some((executor, inner.receiver_epoch))
}

pub(crate) fn schedule(endpoint: Arc<Endpoint>, executor: Arc<dyn Executor>, epoch: u64) {
    trace!(
        endpoint = endpoint.serial(),
        executor = executor.name(),
        epoch,
        "scheduling drain"
    );
    executor.execute(Box::new(move || drain(endpoint, epoch)));
}

enum Step {
    Deliver(QueuedMessage, Arc<MessageCallback>),
    Retarget(Arc<dyn Executor>, u64),
    Idle,
}

fn drain(endpoint: Arc<Endpoint>, epoch: u64) {
    let budget = endpoint.hub().dispatch_budget();
    for _ in 0..budget {
        match next_step(&endpoint, epoch) {
            Step::Deliver(message, callback) => {
                endpoint.metrics().record(DeliveryOutcome::Delivered);
                invoke(&endpoint, &*callback, message);
            }
            Step::Retarget(executor, epoch) => {
                schedule(endpoint, executor, epoch);
                return;
            }
            Step::Idle => return,
        }
    }

    let resume = {
        let mut inner = endpoint.lock();
        match inner.receiver.as_ref() {
            Some(receiver) => Some((Arc::clone(&receiver.executor), inner.receiver_epoch)),
            None => {
                inner.dispatch_scheduled = false;
                None
            }
        }
    };
    if let Some((executor, epoch)) = resume {
        schedule(endpoint, executor, epoch);
    }
}

fn next_step(endpoint: &Endpoint, epoch: u64) -> Step {
    let mut inner = endpoint.lock();
    let (callback, executor) = match inner.receiver.as_ref() {
        Some(receiver) => (
            Arc::clone(&receiver.callback),
            Arc::clone(&receiver.executor),
        ),
        None => {
            inner.dispatch_scheduled = false;
            return Step::Idle;
        }
    };
    if inner.receiver_epoch != epoch {
        return Step::Retarget(executor, inner.receiver_epoch);
    }
    match inner.queue.pop_front() {
        Some(message) => Step::Deliver(message, callback),
        None => {
            inner.dispatch_scheduled = false;
            if inner.state == PortState::Closed {
                // Last pre-close message is out; nothing else may reach the callback.
                inner.receiver = None;
            }
            Step::Idle
        }
    }
}

fn invoke(endpoint: &Endpoint, callback: &MessageCallback, message: QueuedMessage) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(message)));
    if outcome.is_err() {
        warn!(
            endpoint = endpoint.serial(),
            "receive callback panicked, continuing with next message"
        );
    }
}
