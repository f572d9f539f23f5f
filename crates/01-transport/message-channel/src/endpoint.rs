use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::dispatch;
use crate::executor::Executor;
use crate::hub::HubShared;
use crate::metrics::{DeliveryOutcome, PortMetrics};
use crate::payload::QueuedMessage;
use crate::port::{MessageCallback, PortId, PortState};

pub(crate) struct Receiver {
    pub(crate) callback: Arc<MessageCallback>,
    pub(crate) executor: Arc<dyn Executor>,
}

pub(crate) struct EndpointInner {
    /// Handle id currently allowed to act on this endpoint.
    pub(crate) owner: PortId,
    /// State of the current owner. Never `Transferred`.
    pub(crate) state: PortState,
    pub(crate) queue: VecDeque<QueuedMessage>,
    pub(crate) receiver: Option<Receiver>,
    /// Bumped every time the receiver is replaced; stale drain tasks hand off on mismatch.
    pub(crate) receiver_epoch: u64,
    pub(crate) dispatch_scheduled: bool,
}

impl EndpointInner {
    pub(crate) fn state_for(&self, id: PortId) -> PortState {
        if self.owner != id {
            PortState::Transferred
        } else {
            self.state
        }
    }
}

/// Shared body behind every handle to one side of a channel.
///
/// The endpoint survives transfers; only its owning handle id changes.
pub(crate) struct Endpoint {
    serial: u64,
    peer: OnceLock<Weak<Endpoint>>,
    inner: Mutex<EndpointInner>,
    metrics: PortMetrics,
    hub: Arc<HubShared>,
}

impl Endpoint {
    pub(crate) fn new(hub: Arc<HubShared>, owner: PortId) -> Arc<Self> {
        Arc::new(Self {
            serial: hub.next_serial(),
            peer: OnceLock::new(),
            inner: Mutex::new(EndpointInner {
                owner,
                state: PortState::Pending,
                queue: VecDeque::new(),
                receiver: None,
                receiver_epoch: 0,
                dispatch_scheduled: false,
            }),
            metrics: PortMetrics::new(),
            hub,
        })
    }

    /// Links two fresh endpoints. Entanglement is fixed for the endpoints' lifetime.
    pub(crate) fn entangle(a: &Arc<Self>, b: &Arc<Self>) {
        let first = a.peer.set(Arc::downgrade(b));
        let second = b.peer.set(Arc::downgrade(a));
        debug_assert!(first.is_ok() && second.is_ok(), "endpoint entangled twice");
    }

    /// Lock ordering key. Multi-endpoint operations lock in ascending serial order.
    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EndpointInner> {
        self.inner.lock()
    }

    pub(crate) fn peer(&self) -> Option<Arc<Endpoint>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    pub(crate) fn hub(&self) -> &Arc<HubShared> {
        &self.hub
    }

    pub(crate) fn metrics(&self) -> &PortMetrics {
        &self.metrics
    }

    /// Accepts a message sent by the peer.
    pub(crate) fn enqueue(self: &Arc<Self>, message: QueuedMessage) {
        let handoff = {
            let mut inner = self.inner.lock();
            if inner.state == PortState::Closed {
                drop(inner);
                self.metrics.record(DeliveryOutcome::Dropped);
                debug!(endpoint = self.serial, "destination closed, dropping message");
                return;
            }
            inner.queue.push_back(message);
            self.metrics.record(DeliveryOutcome::Queued);
            trace!(endpoint = self.serial, depth = inner.queue.len(), "message queued");
            dispatch::claim(&mut inner)
        };
        if let Some((executor, epoch)) = handoff {
            dispatch::schedule(Arc::clone(self), executor, epoch);
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.queue.is_empty() {
            trace!(
                endpoint = self.serial,
                count = inner.queue.len(),
                "endpoint released with undelivered messages"
            );
        }
        // Nothing can reach the peer any more.
        if let Some(peer) = self.peer() {
            self.hub.release(&peer);
        }
    }
}
