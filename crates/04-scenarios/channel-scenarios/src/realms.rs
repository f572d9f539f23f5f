//! Scripted documents standing in for page JavaScript.

use std::sync::Arc;
use std::time::Duration;

use frame_bridge::{FrameHandle, Realm, RealmMessage};
use message_channel::{Executor, MessagePayload, MessagePort, Origin, QueuedMessage};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::collector::Collector;
use crate::ECHO_SUFFIX;

/// Listens on every port it receives and sends each message straight back.
///
/// Text gets [`ECHO_SUFFIX`] appended; array buffers come back unchanged.
#[derive(Default)]
pub struct EchoRealm {
    executor: Option<Arc<dyn Executor>>,
    ports: Mutex<Vec<MessagePort>>,
}

impl EchoRealm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs the echo callbacks on `executor` instead of the hub default.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Self {
            executor: Some(executor),
            ports: Mutex::new(Vec::new()),
        })
    }

    pub fn port_count(&self) -> usize {
        self.ports.lock().len()
    }
}

fn echo(reply: &MessagePort, incoming: QueuedMessage) {
    let (payload, _) = incoming.into_parts();
    let echoed = match payload {
        MessagePayload::Text(text) => MessagePayload::Text(format!("{text}{ECHO_SUFFIX}")),
        bytes @ MessagePayload::ArrayBuffer(_) => bytes,
    };
    if let Err(err) = reply.post_message(echoed, &[]) {
        warn!(port = %reply.id(), %err, "echo reply failed");
    }
}

impl Realm for EchoRealm {
    fn deliver(&self, _frame: &FrameHandle, message: RealmMessage) {
        for port in message.ports {
            let reply = port.clone();
            let listening =
                port.set_message_callback(move |incoming| echo(&reply, incoming), self.executor.clone());
            match listening {
                Ok(()) => self.ports.lock().push(port),
                Err(err) => warn!(port = %port.id(), %err, "echo realm cannot listen"),
            }
        }
    }

    fn unload(&self) {
        for port in self.ports.lock().drain(..) {
            if let Err(err) = port.close() {
                debug!(port = %port.id(), %err, "port already gone at unload");
            }
        }
    }
}

/// One window message as observed by [`CountingRealm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedWindowMessage {
    pub payload: MessagePayload,
    pub origin: Origin,
    pub is_main_frame: bool,
    pub port_count: usize,
}

/// Records window messages and answers on the first transferred port.
#[derive(Default)]
pub struct CountingRealm {
    received: Collector<ReceivedWindowMessage>,
}

impl CountingRealm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<ReceivedWindowMessage> {
        self.received.snapshot()
    }

    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ReceivedWindowMessage> {
        self.received.wait_for(count, timeout)
    }
}

impl Realm for CountingRealm {
    fn deliver(&self, _frame: &FrameHandle, message: RealmMessage) {
        self.received.push(ReceivedWindowMessage {
            payload: message.payload,
            origin: message.origin,
            is_main_frame: message.is_main_frame,
            port_count: message.ports.len(),
        });
        if let Some(port) = message.ports.first() {
            if let Err(err) = port.post_message(ECHO_SUFFIX, &[]) {
                warn!(port = %port.id(), %err, "counting realm reply failed");
            }
        }
    }
}

/// Where a [`TitleRealm`] reads the text it concatenates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TitleMode {
    /// Window messages themselves.
    Frame,
    /// Messages on the first port transferred by each window message.
    Channel,
}

#[derive(Default)]
struct TitleState {
    received: Mutex<String>,
    titles: Collector<String>,
}

impl TitleState {
    fn append(&self, payload: &MessagePayload) {
        let title = {
            let mut received = self.received.lock();
            match payload {
                MessagePayload::Text(text) => received.push_str(text),
                MessagePayload::ArrayBuffer(bytes) => {
                    received.extend(bytes.iter().map(|&b| char::from(b)))
                }
            }
            received.clone()
        };
        self.titles.push(title);
    }
}

/// Concatenates everything it receives into a document title.
pub struct TitleRealm {
    mode: TitleMode,
    executor: Option<Arc<dyn Executor>>,
    state: Arc<TitleState>,
    ports: Mutex<Vec<MessagePort>>,
}

impl TitleRealm {
    pub fn new(mode: TitleMode) -> Arc<Self> {
        Self::build(mode, None)
    }

    pub fn with_executor(mode: TitleMode, executor: Arc<dyn Executor>) -> Arc<Self> {
        Self::build(mode, Some(executor))
    }

    fn build(mode: TitleMode, executor: Option<Arc<dyn Executor>>) -> Arc<Self> {
        Arc::new(Self {
            mode,
            executor,
            state: Arc::default(),
            ports: Mutex::new(Vec::new()),
        })
    }

    pub fn title(&self) -> String {
        self.state.received.lock().clone()
    }

    /// Blocks until the title equals `expected`. Returns the last title seen.
    pub fn wait_for_title(&self, expected: &str, timeout: Duration) -> String {
        self.state
            .titles
            .wait_until(|titles| titles.last().is_some_and(|t| t == expected), timeout);
        self.title()
    }
}

impl Realm for TitleRealm {
    fn deliver(&self, _frame: &FrameHandle, message: RealmMessage) {
        match self.mode {
            TitleMode::Frame => self.state.append(&message.payload),
            TitleMode::Channel => {
                let Some(port) = message.ports.into_iter().next() else {
                    debug!("title realm expected a port, ignoring message");
                    return;
                };
                let state = Arc::clone(&self.state);
                let listening = port.set_message_callback(
                    move |incoming| state.append(incoming.payload()),
                    self.executor.clone(),
                );
                match listening {
                    Ok(()) => self.ports.lock().push(port),
                    Err(err) => warn!(port = %port.id(), %err, "title realm cannot listen"),
                }
            }
        }
    }

    fn unload(&self) {
        for port in self.ports.lock().drain(..) {
            if let Err(err) = port.close() {
                debug!(port = %port.id(), %err, "port already gone at unload");
            }
        }
    }
}
