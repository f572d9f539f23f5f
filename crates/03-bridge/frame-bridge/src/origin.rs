use message_channel::{Origin, EMBEDDER_ORIGIN, OPAQUE_ORIGIN};
use url::Url;

use crate::error::{BridgeError, BridgeResult};

/// Origin of the document at `url`.
///
/// Default ports are elided. `file:` documents share the `"file://"` origin;
/// every other opaque or unparsable URL serialises to `"null"`.
pub fn origin_of_url(url: Option<&str>) -> Origin {
    match url.map(Url::parse) {
        Some(Ok(url)) => origin_of(&url),
        _ => Origin::opaque(),
    }
}

pub(crate) fn origin_of(url: &Url) -> Origin {
    if url.scheme() == "file" {
        return Origin::new("file://");
    }
    Origin::new(url.origin().ascii_serialization())
}

/// Destination filter for window posts from the embedder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `"*"` or `""`.
    Any,
    /// Only a document with exactly this origin receives the message.
    Exact(Origin),
}

impl TargetOrigin {
    pub fn parse(rule: &str) -> BridgeResult<Self> {
        match rule {
            "*" | EMBEDDER_ORIGIN => Ok(TargetOrigin::Any),
            OPAQUE_ORIGIN => Ok(TargetOrigin::Exact(Origin::opaque())),
            _ => Url::parse(rule)
                .map(|url| TargetOrigin::Exact(origin_of(&url)))
                .map_err(|_| BridgeError::InvalidTargetOrigin(rule.to_owned())),
        }
    }

    pub fn matches(&self, origin: &Origin) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }
}
