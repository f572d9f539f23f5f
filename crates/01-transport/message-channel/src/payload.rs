use serde::Serialize;
use smallvec::SmallVec;

use crate::origin::Origin;
use crate::port::MessagePort;

/// Message body: exactly one of UTF-8 text or a raw byte buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagePayload {
    Text(String),
    ArrayBuffer(Vec<u8>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    Text,
    ArrayBuffer,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePayload::Text(text.into())
    }

    pub fn array_buffer(bytes: impl Into<Vec<u8>>) -> Self {
        MessagePayload::ArrayBuffer(bytes.into())
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            MessagePayload::Text(_) => PayloadKind::Text,
            MessagePayload::ArrayBuffer(_) => PayloadKind::ArrayBuffer,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text(text) => Some(text),
            MessagePayload::ArrayBuffer(_) => None,
        }
    }

    pub fn as_array_buffer(&self) -> Option<&[u8]> {
        match self {
            MessagePayload::ArrayBuffer(bytes) => Some(bytes),
            MessagePayload::Text(_) => None,
        }
    }

    /// Size of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            MessagePayload::Text(text) => text.len(),
            MessagePayload::ArrayBuffer(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for MessagePayload {
    fn from(value: &str) -> Self {
        MessagePayload::Text(value.to_owned())
    }
}

impl From<String> for MessagePayload {
    fn from(value: String) -> Self {
        MessagePayload::Text(value)
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(value: Vec<u8>) -> Self {
        MessagePayload::ArrayBuffer(value)
    }
}

/// A message sitting in (or handed out of) a port's receive queue.
///
/// The payload cannot be mutated once enqueued; receivers take it by value.
#[derive(Debug)]
pub struct QueuedMessage {
    payload: MessagePayload,
    ports: SmallVec<[MessagePort; 2]>,
    origin: Option<Origin>,
}

impl QueuedMessage {
    pub(crate) fn new(
        payload: MessagePayload,
        ports: SmallVec<[MessagePort; 2]>,
        origin: Option<Origin>,
    ) -> Self {
        Self {
            payload,
            ports,
            origin,
        }
    }

    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Ports that travelled with this message, in transfer-list order.
    pub fn ports(&self) -> &[MessagePort] {
        &self.ports
    }

    /// Origin captured when the message was created, if it crossed a document boundary.
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn into_parts(self) -> (MessagePayload, SmallVec<[MessagePort; 2]>) {
        (self.payload, self.ports)
    }
}
