use std::fmt;
use std::sync::{Arc, Weak};

use message_channel::{MessagePayload, MessagePort, Origin};
use parking_lot::Mutex;
use tracing::debug;

use crate::bridge::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::listener::{JsReplyProxy, WebMessageEvent};
use crate::realm::Realm;

/// Identity of one loaded document. A cross-document navigation always mints a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub(crate) u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

pub(crate) struct FrameInit {
    pub(crate) id: FrameId,
    pub(crate) document: DocumentId,
    pub(crate) is_main: bool,
    pub(crate) url: String,
    pub(crate) origin: Origin,
    pub(crate) top_level_origin: Origin,
    pub(crate) injected: Vec<String>,
}

pub(crate) struct Frame {
    pub(crate) id: FrameId,
    pub(crate) document: DocumentId,
    pub(crate) is_main: bool,
    pub(crate) url: Mutex<String>,
    pub(crate) origin: Origin,
    pub(crate) top_level_origin: Origin,
    /// Objects injected when the frame attached. Fixed for the frame's lifetime.
    pub(crate) injected: Vec<String>,
    /// `None` once detached.
    realm: Mutex<Option<Arc<dyn Realm>>>,
}

impl Frame {
    pub(crate) fn new(init: FrameInit, realm: Arc<dyn Realm>) -> Arc<Self> {
        Arc::new(Self {
            id: init.id,
            document: init.document,
            is_main: init.is_main,
            url: Mutex::new(init.url),
            origin: init.origin,
            top_level_origin: init.top_level_origin,
            injected: init.injected,
            realm: Mutex::new(Some(realm)),
        })
    }

    pub(crate) fn realm(&self) -> Option<Arc<dyn Realm>> {
        self.realm.lock().clone()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.realm.lock().is_some()
    }

    pub(crate) fn detach(&self) {
        let realm = self.realm.lock().take();
        if let Some(realm) = realm {
            debug!(frame = %self.id, document = %self.document, "frame detached");
            realm.unload();
        }
    }
}

/// One document's frame tree.
pub(crate) struct Page {
    pub(crate) document: DocumentId,
    pub(crate) main: Arc<Frame>,
    pub(crate) children: Mutex<Vec<Arc<Frame>>>,
}

impl Page {
    pub(crate) fn new(document: DocumentId, main: Arc<Frame>) -> Self {
        Self {
            document,
            main,
            children: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn detach_all(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in children {
            child.detach();
        }
        self.main.detach();
    }
}

/// Handle to a frame as seen from inside its document.
///
/// Stays valid after the frame detaches; posts through a detached handle
/// are dropped silently.
#[derive(Clone)]
pub struct FrameHandle {
    pub(crate) frame: Arc<Frame>,
    pub(crate) bridge: Weak<BridgeShared>,
}

impl FrameHandle {
    pub(crate) fn new(frame: Arc<Frame>, bridge: Weak<BridgeShared>) -> Self {
        Self { frame, bridge }
    }

    pub fn id(&self) -> FrameId {
        self.frame.id
    }

    pub fn document(&self) -> DocumentId {
        self.frame.document
    }

    pub fn is_main_frame(&self) -> bool {
        self.frame.is_main
    }

    pub fn url(&self) -> String {
        self.frame.url.lock().clone()
    }

    pub fn origin(&self) -> &Origin {
        &self.frame.origin
    }

    pub fn top_level_origin(&self) -> &Origin {
        &self.frame.top_level_origin
    }

    pub fn is_attached(&self) -> bool {
        self.frame.is_attached()
    }

    /// Names of the web-message listener objects visible in this frame.
    pub fn injected_objects(&self) -> &[String] {
        &self.frame.injected
    }

    pub fn has_object(&self, object_name: &str) -> bool {
        self.frame.injected.iter().any(|name| name == object_name)
    }

    /// `object.postMessage(payload, transfer)` from script.
    ///
    /// Fails if the object was never injected here or a port cannot be
    /// transferred. A detached frame or a listener removed since injection
    /// drops the message silently.
    pub fn post_to_object(
        &self,
        object_name: &str,
        payload: impl Into<MessagePayload>,
        transfer: &[MessagePort],
    ) -> BridgeResult<()> {
        if !self.has_object(object_name) {
            return Err(BridgeError::ObjectNotInjected(object_name.to_owned()));
        }
        let Some(bridge) = self.bridge.upgrade() else {
            debug!(frame = %self.frame.id, object = object_name, "bridge gone, dropping post");
            return Ok(());
        };
        let ports = bridge.hub.transfer(transfer)?;
        if !self.frame.is_attached() {
            debug!(frame = %self.frame.id, object = object_name, "frame detached, dropping post");
            return Ok(());
        }
        let Some(listener) = bridge.listeners.lock().lookup(object_name) else {
            debug!(object = object_name, "listener removed, dropping post");
            return Ok(());
        };
        let event = WebMessageEvent {
            payload: payload.into(),
            source_origin: self.frame.origin.clone(),
            top_level_origin: self.frame.top_level_origin.clone(),
            is_main_frame: self.frame.is_main,
            ports,
            reply_proxy: JsReplyProxy::new(&self.frame, &bridge, object_name),
        };
        bridge
            .executor
            .execute(Box::new(move || listener.on_post_message(event)));
        Ok(())
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("id", &self.frame.id)
            .field("document", &self.frame.document)
            .field("origin", &self.frame.origin)
            .field("main", &self.frame.is_main)
            .finish()
    }
}
