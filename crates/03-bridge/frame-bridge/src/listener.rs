use std::fmt;
use std::sync::{Arc, Weak};

use message_channel::{MessagePayload, Origin, TransferList};
use tracing::debug;

use crate::bridge::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::frame::{Frame, FrameHandle};
use crate::rules::OriginRuleSet;

/// Application-side receiver for posts made through an injected object.
pub trait WebMessageListener: Send + Sync + 'static {
    fn on_post_message(&self, event: WebMessageEvent);
}

impl<F> WebMessageListener for F
where
    F: Fn(WebMessageEvent) + Send + Sync + 'static,
{
    fn on_post_message(&self, event: WebMessageEvent) {
        self(event)
    }
}

#[derive(Debug)]
pub struct WebMessageEvent {
    pub payload: MessagePayload,
    pub source_origin: Origin,
    pub top_level_origin: Origin,
    pub is_main_frame: bool,
    pub ports: TransferList,
    /// Sends replies back to the posting frame's object.
    pub reply_proxy: JsReplyProxy,
}

/// Reply channel to the object in one frame.
#[derive(Clone)]
pub struct JsReplyProxy {
    frame: Weak<Frame>,
    bridge: Weak<BridgeShared>,
    object_name: Arc<str>,
}

impl JsReplyProxy {
    pub(crate) fn new(frame: &Arc<Frame>, bridge: &Arc<BridgeShared>, object_name: &str) -> Self {
        Self {
            frame: Arc::downgrade(frame),
            bridge: Arc::downgrade(bridge),
            object_name: Arc::from(object_name),
        }
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// False once the originating frame has been detached.
    pub fn is_alive(&self) -> bool {
        self.frame.upgrade().is_some_and(|frame| frame.is_attached())
    }

    /// Queues `payload` for the frame's object. Dropped if the frame is gone.
    pub fn post_message(&self, payload: impl Into<MessagePayload>) {
        let (Some(frame), Some(bridge)) = (self.frame.upgrade(), self.bridge.upgrade()) else {
            debug!(object = %self.object_name, "reply target gone, dropping reply");
            return;
        };
        if !frame.is_attached() {
            debug!(object = %self.object_name, frame = %frame.id, "frame detached, dropping reply");
            return;
        }
        let handle = FrameHandle::new(frame, Arc::downgrade(&bridge));
        let object_name = Arc::clone(&self.object_name);
        let payload = payload.into();
        bridge.executor.execute(Box::new(move || {
            match handle.frame.realm() {
                Some(realm) => realm.deliver_to_object(&handle, &object_name, payload),
                None => debug!(object = %object_name, "frame detached before reply delivery"),
            }
        }));
    }
}

impl fmt::Debug for JsReplyProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsReplyProxy")
            .field("object_name", &self.object_name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct ListenerEntry {
    name: String,
    rules: OriginRuleSet,
    listener: Arc<dyn WebMessageListener>,
}

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Vec<ListenerEntry>,
}

impl ListenerRegistry {
    pub(crate) fn add(
        &mut self,
        name: &str,
        rules: OriginRuleSet,
        listener: Arc<dyn WebMessageListener>,
    ) -> BridgeResult<()> {
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(BridgeError::DuplicateObjectName(name.to_owned()));
        }
        self.entries.push(ListenerEntry {
            name: name.to_owned(),
            rules,
            listener,
        });
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        self.entries.len() != before
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Arc<dyn WebMessageListener>> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| Arc::clone(&entry.listener))
    }

    /// Object names to inject into a frame with `origin`.
    pub(crate) fn injections_for(&self, origin: &Origin) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.rules.matches(origin))
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }
}
