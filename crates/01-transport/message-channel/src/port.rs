use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::dispatch;
use crate::endpoint::{Endpoint, Receiver};
use crate::error::{PortError, PortResult, StateViolation};
use crate::executor::Executor;
use crate::ledger;
use crate::metrics::PortMetricsSnapshot;
use crate::origin::Origin;
use crate::payload::{MessagePayload, QueuedMessage};

/// Identity of one port handle. Never reused within a hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortId(u64);

impl PortId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Lifecycle of a port handle.
///
/// `Transferred` and `Closed` are terminal for the handle that reached them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortState {
    /// Freshly created or freshly received; may still be transferred.
    Pending,
    /// Has sent a message or has a receive callback; can no longer be transferred.
    Started,
    /// Handed to another realm; this handle is inert.
    Transferred,
    /// Closed locally.
    Closed,
}

impl PortState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PortState::Transferred | PortState::Closed)
    }
}

/// Receive callback. Runs on the executor registered at delivery time.
pub type MessageCallback = dyn Fn(QueuedMessage) + Send + Sync + 'static;

/// Ports moved by a single post, in transfer-list order.
pub type TransferList = SmallVec<[MessagePort; 2]>;

/// Handle to one end of a [`Channel`](crate::Channel).
///
/// Clones share the same identity: transferring or closing through one clone
/// is observed by all of them.
#[derive(Clone)]
pub struct MessagePort {
    id: PortId,
    endpoint: Arc<Endpoint>,
}

impl MessagePort {
    pub(crate) fn from_parts(id: PortId, endpoint: Arc<Endpoint>) -> Self {
        Self { id, endpoint }
    }

    pub(crate) fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn state(&self) -> PortState {
        self.endpoint.lock().state_for(self.id)
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PortState::Pending
    }

    pub fn is_started(&self) -> bool {
        self.state() == PortState::Started
    }

    pub fn is_transferred(&self) -> bool {
        self.state() == PortState::Transferred
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PortState::Closed
    }

    /// Messages waiting in this port's receive queue.
    pub fn queued_len(&self) -> usize {
        let inner = self.endpoint.lock();
        if inner.owner == self.id {
            inner.queue.len()
        } else {
            0
        }
    }

    /// Delivery counters of the underlying endpoint (shared with whoever owns it now).
    pub fn metrics(&self) -> PortMetricsSnapshot {
        self.endpoint.metrics().snapshot()
    }

    /// Returns true if `other` is the opposite end of this port's channel.
    pub fn is_entangled_with(&self, other: &MessagePort) -> bool {
        self.endpoint
            .peer()
            .is_some_and(|peer| Arc::ptr_eq(&peer, &other.endpoint))
    }

    /// Sends `payload` to the entangled peer, moving every port in `transfer` along with it.
    ///
    /// The whole transfer list is validated before any state changes. On success
    /// this port becomes `Started` and each transferred handle becomes `Transferred`.
    /// A closed or released peer drops the message without reporting an error.
    pub fn post_message(
        &self,
        payload: impl Into<MessagePayload>,
        transfer: &[MessagePort],
    ) -> PortResult<()> {
        self.post(payload.into(), transfer, None)
    }

    /// Like [`post_message`](Self::post_message), stamping the message with the
    /// sending document's origin so receivers can scope it.
    pub fn post_message_from(
        &self,
        origin: Origin,
        payload: impl Into<MessagePayload>,
        transfer: &[MessagePort],
    ) -> PortResult<()> {
        self.post(payload.into(), transfer, Some(origin))
    }

    fn post(
        &self,
        payload: MessagePayload,
        transfer: &[MessagePort],
        origin: Option<Origin>,
    ) -> PortResult<()> {
        let ports = ledger::commit(self.endpoint.hub(), Some(self), transfer)?;
        let message = QueuedMessage::new(payload, ports, origin);
        match self.endpoint.peer() {
            Some(peer) => peer.enqueue(message),
            None => debug!(port = %self.id, "peer endpoint released, dropping message"),
        }
        Ok(())
    }

    /// Installs (or replaces) the receive callback and starts the port.
    ///
    /// Already queued messages are delivered to the new callback in arrival order.
    /// `None` selects the hub's default executor.
    pub fn set_message_callback<F>(
        &self,
        callback: F,
        executor: Option<Arc<dyn Executor>>,
    ) -> PortResult<()>
    where
        F: Fn(QueuedMessage) + Send + Sync + 'static,
    {
        let hub = self.endpoint.hub();
        let executor = executor.unwrap_or_else(|| hub.default_executor());
        let handoff = {
            let mut inner = self.endpoint.lock();
            match inner.state_for(self.id) {
                PortState::Transferred => {
                    return Err(self.violation(StateViolation::AlreadyTransferred));
                }
                PortState::Closed => return Err(self.violation(StateViolation::AlreadyClosed)),
                PortState::Pending | PortState::Started => {}
            }
            inner.state = PortState::Started;
            inner.receiver = Some(Receiver {
                callback: Arc::new(callback),
                executor,
            });
            inner.receiver_epoch = inner.receiver_epoch.wrapping_add(1);
            hub.keep_alive(&self.endpoint);
            dispatch::claim(&mut inner)
        };
        if let Some((executor, epoch)) = handoff {
            dispatch::schedule(Arc::clone(&self.endpoint), executor, epoch);
        }
        if self.endpoint.peer().is_none() {
            hub.release(&self.endpoint);
        }
        Ok(())
    }

    /// Closes the port. Closing twice is a no-op; closing a transferred handle fails.
    ///
    /// Messages already queued here still reach an installed callback. Without a
    /// callback they are discarded. Later arrivals are dropped silently. The
    /// peer stops being kept alive, though messages already queued for it are
    /// still delivered.
    pub fn close(&self) -> PortResult<()> {
        let discarded = {
            let mut inner = self.endpoint.lock();
            match inner.state_for(self.id) {
                PortState::Transferred => {
                    return Err(self.violation(StateViolation::AlreadyTransferred));
                }
                PortState::Closed => return Ok(()),
                PortState::Pending | PortState::Started => {}
            }
            inner.state = PortState::Closed;
            if inner.dispatch_scheduled {
                Default::default()
            } else {
                inner.receiver = None;
                std::mem::take(&mut inner.queue)
            }
        };
        // Neither side can receive anything new once one side is closed.
        let hub = self.endpoint.hub();
        hub.release(&self.endpoint);
        if let Some(peer) = self.endpoint.peer() {
            hub.release(&peer);
        }
        if !discarded.is_empty() {
            debug!(
                port = %self.id,
                count = discarded.len(),
                "closed port without receiver, discarding queued messages"
            );
            for _ in &discarded {
                self.endpoint
                    .metrics()
                    .record(crate::metrics::DeliveryOutcome::Discarded);
            }
        }
        Ok(())
    }

    fn violation(&self, violation: StateViolation) -> PortError {
        PortError::invalid_state(self.id, violation)
    }
}

impl fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePort")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.serial())
            .finish()
    }
}
