use std::fmt;
use std::sync::Arc;

/// Serialisation of an opaque origin (data: URLs, sandboxed frames, unknown documents).
pub const OPAQUE_ORIGIN: &str = "null";

/// Origin reported for messages posted by the embedding application.
pub const EMBEDDER_ORIGIN: &str = "";

/// Opaque origin string such as `"https://host:port"`.
///
/// `"null"` is an ordinary, comparable value here; it is never a missing origin.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Origin(Arc<str>);

impl Origin {
    pub fn new(origin: impl AsRef<str>) -> Self {
        Self(Arc::from(origin.as_ref()))
    }

    pub fn opaque() -> Self {
        Self::new(OPAQUE_ORIGIN)
    }

    pub fn embedder() -> Self {
        Self::new(EMBEDDER_ORIGIN)
    }

    pub fn is_opaque(&self) -> bool {
        &*self.0 == OPAQUE_ORIGIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({:?})", &*self.0)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for Origin {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Origin {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
