use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::PortResult;
use crate::executor::{Executor, InlineExecutor};
use crate::ledger;
use crate::port::{MessagePort, PortId, TransferList};

/// Messages a single drain task delivers before yielding its executor.
pub const DEFAULT_DISPATCH_BUDGET: usize = 32;

pub(crate) struct HubShared {
    next_port: AtomicU64,
    next_serial: AtomicU64,
    default_executor: Arc<dyn Executor>,
    dispatch_budget: usize,
    /// Endpoints with a live receive callback. Holding them here keeps a
    /// listening port working after the application drops its last handle.
    listening: Mutex<HashMap<u64, Arc<Endpoint>>>,
}

impl HubShared {
    pub(crate) fn next_port_id(&self) -> PortId {
        PortId::from_raw(self.next_port.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn default_executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.default_executor)
    }

    pub(crate) fn dispatch_budget(&self) -> usize {
        self.dispatch_budget
    }

    pub(crate) fn keep_alive(&self, endpoint: &Arc<Endpoint>) {
        let previous = self
            .listening
            .lock()
            .insert(endpoint.serial(), Arc::clone(endpoint));
        if previous.is_none() {
            trace!(endpoint = endpoint.serial(), "endpoint listening");
        }
    }

    /// Stops keeping `endpoint` alive.
    ///
    /// The removed entry may be the last reference. It is dropped after the
    /// map lock is released, since dropping an endpoint releases its peer.
    pub(crate) fn release(&self, endpoint: &Endpoint) {
        let removed = self.listening.lock().remove(&endpoint.serial());
        if removed.is_some() {
            trace!(endpoint = endpoint.serial(), "endpoint stopped listening");
        }
        drop(removed);
    }
}

/// Factory and shared context for channels.
///
/// Cloning is cheap; clones share port numbering, the default executor and
/// the set of listening endpoints.
#[derive(Clone)]
pub struct MessageHub {
    shared: Arc<HubShared>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MessageHubBuilder {
        MessageHubBuilder::default()
    }

    /// Creates two entangled, pending ports.
    pub fn create_channel(&self) -> Channel {
        let (id1, id2) = (self.shared.next_port_id(), self.shared.next_port_id());
        let first = Endpoint::new(Arc::clone(&self.shared), id1);
        let second = Endpoint::new(Arc::clone(&self.shared), id2);
        Endpoint::entangle(&first, &second);
        let port1 = MessagePort::from_parts(id1, first);
        let port2 = MessagePort::from_parts(id2, second);
        debug!(port1 = %port1.id(), port2 = %port2.id(), "channel created");
        Channel { port1, port2 }
    }

    /// Moves `ports` out of their current handles without a sending port.
    ///
    /// Same validation as [`MessagePort::post_message`]: every port must be
    /// pending and listed once, or nothing moves.
    pub fn transfer(&self, ports: &[MessagePort]) -> PortResult<TransferList> {
        ledger::commit(&self.shared, None, ports)
    }

    pub fn default_executor(&self) -> Arc<dyn Executor> {
        self.shared.default_executor()
    }

    pub fn dispatch_budget(&self) -> usize {
        self.shared.dispatch_budget
    }

    /// Number of endpoints currently kept alive by a receive callback.
    pub fn listening_ports(&self) -> usize {
        self.shared.listening.lock().len()
    }
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHub")
            .field("executor", &self.shared.default_executor.name())
            .field("dispatch_budget", &self.shared.dispatch_budget)
            .field("listening", &self.listening_ports())
            .finish()
    }
}

pub struct MessageHubBuilder {
    default_executor: Arc<dyn Executor>,
    dispatch_budget: usize,
}

impl Default for MessageHubBuilder {
    fn default() -> Self {
        Self {
            default_executor: Arc::new(InlineExecutor),
            dispatch_budget: DEFAULT_DISPATCH_BUDGET,
        }
    }
}

impl MessageHubBuilder {
    /// Executor used when a callback is installed without one.
    pub fn default_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.default_executor = executor;
        self
    }

    /// Clamped to at least one message per drain.
    pub fn dispatch_budget(mut self, budget: usize) -> Self {
        self.dispatch_budget = budget.max(1);
        self
    }

    pub fn build(self) -> MessageHub {
        MessageHub {
            shared: Arc::new(HubShared {
                next_port: AtomicU64::new(1),
                next_serial: AtomicU64::new(1),
                default_executor: self.default_executor,
                dispatch_budget: self.dispatch_budget,
                listening: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// A freshly created pair of entangled ports.
#[derive(Clone, Debug)]
pub struct Channel {
    port1: MessagePort,
    port2: MessagePort,
}

impl Channel {
    pub fn port1(&self) -> &MessagePort {
        &self.port1
    }

    pub fn port2(&self) -> &MessagePort {
        &self.port2
    }

    pub fn ports(&self) -> [&MessagePort; 2] {
        [&self.port1, &self.port2]
    }

    pub fn into_ports(self) -> (MessagePort, MessagePort) {
        (self.port1, self.port2)
    }
}
