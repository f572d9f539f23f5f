use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use message_channel::{Executor, MessageHub, MessagePayload, MessagePort, Origin};
use parking_lot::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::error::BridgeResult;
use crate::frame::{DocumentId, Frame, FrameHandle, FrameId, FrameInit, Page};
use crate::listener::{ListenerRegistry, WebMessageListener};
use crate::origin::{origin_of, origin_of_url, TargetOrigin};
use crate::realm::{Realm, RealmMessage};
use crate::rules::OriginRuleSet;

pub(crate) struct BridgeShared {
    pub(crate) hub: MessageHub,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) page: ArcSwapOption<Page>,
    pub(crate) listeners: Mutex<ListenerRegistry>,
    next_document: AtomicU64,
    next_frame: AtomicU64,
}

impl BridgeShared {
    fn current_document(&self) -> Option<DocumentId> {
        self.page.load_full().map(|page| page.document)
    }
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        if let Some(page) = self.page.swap(None) {
            page.detach_all();
        }
    }
}

/// The embedder's view of one browsing context.
///
/// Exactly one document is bound at a time. [`load`](Self::load) replaces it;
/// anything still addressed to the previous document is dropped.
#[derive(Clone)]
pub struct MainFrameBridge {
    shared: Arc<BridgeShared>,
}

impl MainFrameBridge {
    /// Delivers on the hub's default executor.
    pub fn new(hub: MessageHub) -> Self {
        let executor = hub.default_executor();
        Self::with_executor(hub, executor)
    }

    pub fn with_executor(hub: MessageHub, executor: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                hub,
                executor,
                page: ArcSwapOption::empty(),
                listeners: Mutex::new(ListenerRegistry::default()),
                next_document: AtomicU64::new(1),
                next_frame: AtomicU64::new(1),
            }),
        }
    }

    pub fn hub(&self) -> &MessageHub {
        &self.shared.hub
    }

    pub fn current_document(&self) -> Option<DocumentId> {
        self.shared.current_document()
    }

    pub fn current_origin(&self) -> Option<Origin> {
        self.shared
            .page
            .load_full()
            .map(|page| page.main.origin.clone())
    }

    pub fn main_frame(&self) -> Option<FrameHandle> {
        let page = self.shared.page.load_full()?;
        Some(self.handle(Arc::clone(&page.main)))
    }

    pub fn child_frames(&self) -> Vec<FrameHandle> {
        let Some(page) = self.shared.page.load_full() else {
            return Vec::new();
        };
        let children = page.children.lock();
        children
            .iter()
            .map(|frame| self.handle(Arc::clone(frame)))
            .collect()
    }

    /// Cross-document navigation of the main frame.
    ///
    /// Mints a new document, injects every listener whose rules match the new
    /// origin, then detaches all frames of the previous document.
    pub fn load(&self, url: &str, realm: Arc<dyn Realm>) -> FrameHandle {
        let document = DocumentId(self.shared.next_document.fetch_add(1, Ordering::Relaxed));
        let origin = origin_of_url(Some(url));
        let injected = self.shared.listeners.lock().injections_for(&origin);
        let main = Frame::new(
            FrameInit {
                id: self.next_frame_id(),
                document,
                is_main: true,
                url: url.to_owned(),
                origin: origin.clone(),
                top_level_origin: origin.clone(),
                injected,
            },
            realm,
        );
        let previous = self
            .shared
            .page
            .swap(Some(Arc::new(Page::new(document, Arc::clone(&main)))));
        if let Some(previous) = previous {
            debug!(from = %previous.document, to = %document, "rebinding main frame");
            previous.detach_all();
        }
        debug!(%document, %origin, objects = ?main.injected, "document loaded");
        self.handle(main)
    }

    /// Fragment-style navigation within the current document.
    ///
    /// Keeps the binding and never injects. Returns false when no document is
    /// bound or `url` belongs to another origin.
    pub fn navigate_same_document(&self, url: &str) -> bool {
        let Some(page) = self.shared.page.load_full() else {
            return false;
        };
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if origin_of(&parsed) != page.main.origin {
            debug!(url, current = %page.main.origin, "same-document navigation crosses origins");
            return false;
        }
        *page.main.url.lock() = url.to_owned();
        trace!(document = %page.document, url, "same-document navigation");
        true
    }

    /// Adds a child frame to the current document. `None` if nothing is loaded.
    pub fn attach_child_frame(&self, url: &str, realm: Arc<dyn Realm>) -> Option<FrameHandle> {
        let page = self.shared.page.load_full()?;
        let origin = origin_of_url(Some(url));
        let injected = self.shared.listeners.lock().injections_for(&origin);
        let frame = Frame::new(
            FrameInit {
                id: self.next_frame_id(),
                document: page.document,
                is_main: false,
                url: url.to_owned(),
                origin,
                top_level_origin: page.main.origin.clone(),
                injected,
            },
            realm,
        );
        page.children.lock().push(Arc::clone(&frame));
        if self.shared.current_document() != Some(page.document) {
            // Lost a race with `load`; the page we attached to is already gone.
            frame.detach();
        }
        Some(self.handle(frame))
    }

    /// Removes a child frame. Returns false for main frames and unknown frames.
    pub fn detach_child_frame(&self, frame: &FrameHandle) -> bool {
        let Some(page) = self.shared.page.load_full() else {
            return false;
        };
        let removed = {
            let mut children = page.children.lock();
            let before = children.len();
            children.retain(|child| !Arc::ptr_eq(child, &frame.frame));
            children.len() != before
        };
        if removed {
            frame.frame.detach();
        }
        removed
    }

    /// `window.postMessage(payload, target_origin, transfer)` from the embedder.
    ///
    /// A malformed `target_origin` or an invalid transfer list fails. Once the
    /// ports are transferred, a mismatched origin or a missing document drops
    /// the message silently; so does a navigation that happens before delivery.
    pub fn post_message_to_main_frame(
        &self,
        payload: impl Into<MessagePayload>,
        target_origin: &str,
        transfer: &[MessagePort],
    ) -> BridgeResult<()> {
        let target = TargetOrigin::parse(target_origin)?;
        let ports = self.shared.hub.transfer(transfer)?;
        let Some(page) = self.shared.page.load_full() else {
            debug!("no document bound, dropping window message");
            return Ok(());
        };
        if !target.matches(&page.main.origin) {
            debug!(
                target = target_origin,
                origin = %page.main.origin,
                "target origin mismatch, dropping window message"
            );
            return Ok(());
        }
        let message = RealmMessage {
            payload: payload.into(),
            origin: Origin::embedder(),
            is_main_frame: true,
            ports,
        };
        let document = page.document;
        let frame = Arc::clone(&page.main);
        let shared = Arc::downgrade(&self.shared);
        self.shared.executor.execute(Box::new(move || {
            deliver_window_message(shared, document, frame, message)
        }));
        Ok(())
    }

    /// Registers `listener` under `object_name`.
    ///
    /// Takes effect from the next cross-document navigation or child-frame
    /// attach; documents already loaded are unaffected.
    pub fn add_web_message_listener<S, L>(
        &self,
        object_name: &str,
        allowed_origin_rules: &[S],
        listener: L,
    ) -> BridgeResult<()>
    where
        S: AsRef<str>,
        L: WebMessageListener,
    {
        let rules = OriginRuleSet::parse(allowed_origin_rules)?;
        self.shared
            .listeners
            .lock()
            .add(object_name, rules, Arc::new(listener))?;
        debug!(object = object_name, "web message listener added");
        Ok(())
    }

    /// Unregisters `object_name`. Posts through objects already injected are
    /// dropped from now on. Returns false if nothing was registered.
    pub fn remove_web_message_listener(&self, object_name: &str) -> bool {
        let removed = self.shared.listeners.lock().remove(object_name);
        if removed {
            debug!(object = object_name, "web message listener removed");
        }
        removed
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.shared.listeners.lock().names()
    }

    fn handle(&self, frame: Arc<Frame>) -> FrameHandle {
        FrameHandle::new(frame, Arc::downgrade(&self.shared))
    }

    fn next_frame_id(&self) -> FrameId {
        FrameId(self.shared.next_frame.fetch_add(1, Ordering::Relaxed))
    }
}

fn deliver_window_message(
    shared: Weak<BridgeShared>,
    document: DocumentId,
    frame: Arc<Frame>,
    message: RealmMessage,
) {
    let Some(bridge) = shared.upgrade() else {
        debug!(%document, "bridge gone, dropping window message");
        return;
    };
    if bridge.current_document() != Some(document) {
        debug!(%document, "document replaced before delivery, dropping window message");
        return;
    }
    let Some(realm) = frame.realm() else {
        debug!(%document, "frame detached before delivery, dropping window message");
        return;
    };
    let handle = FrameHandle::new(frame, shared);
    realm.deliver(&handle, message);
}
