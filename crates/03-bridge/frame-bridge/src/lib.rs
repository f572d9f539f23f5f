//! Document-facing side of message ports.
//!
//! [`MainFrameBridge`] stands in for a loaded page: the embedder posts to the
//! page's main frame with a target-origin filter, registers web-message
//! listeners that get injected into matching frames, and rebinds to a fresh
//! document on every cross-document navigation. Documents themselves are
//! [`Realm`] implementations supplied by the caller.

mod bridge;
mod error;
mod frame;
mod listener;
mod origin;
mod realm;
mod rules;

pub use bridge::MainFrameBridge;
pub use error::{BridgeError, BridgeResult};
pub use frame::{DocumentId, FrameHandle, FrameId};
pub use listener::{JsReplyProxy, WebMessageEvent, WebMessageListener};
pub use origin::{origin_of_url, TargetOrigin};
pub use realm::{Realm, RealmMessage};
pub use rules::{OriginRule, OriginRuleSet};
