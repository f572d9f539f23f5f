use message_channel::{MessagePayload, Origin, TransferList};

use crate::frame::FrameHandle;

/// A window post as seen by the receiving document.
#[derive(Debug)]
pub struct RealmMessage {
    pub payload: MessagePayload,
    /// Sender's origin. Posts from the embedding application carry `""`.
    pub origin: Origin,
    pub is_main_frame: bool,
    /// Ports that travelled with the message, owned by the document now.
    pub ports: TransferList,
}

/// A document's script context.
///
/// Upcalls arrive on the bridge's executor, one at a time and in posting order.
pub trait Realm: Send + Sync + 'static {
    /// A window `message` event.
    fn deliver(&self, frame: &FrameHandle, message: RealmMessage);

    /// A reply sent through an injected object's reply proxy.
    fn deliver_to_object(&self, frame: &FrameHandle, object_name: &str, payload: MessagePayload) {
        let _ = (frame, object_name, payload);
    }

    /// The frame was detached (navigation or bridge teardown). Called once.
    fn unload(&self) {}
}
