use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    Echo,
    ArrayBuffer,
    Ordering,
    CloseAfterSend,
    Lifecycle,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::Echo,
        ScenarioKind::ArrayBuffer,
        ScenarioKind::Ordering,
        ScenarioKind::CloseAfterSend,
        ScenarioKind::Lifecycle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::Echo => "echo",
            ScenarioKind::ArrayBuffer => "array-buffer",
            ScenarioKind::Ordering => "ordering",
            ScenarioKind::CloseAfterSend => "close-after-send",
            ScenarioKind::Lifecycle => "lifecycle",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    /// Array-buffer length in bytes.
    pub size: usize,
    /// Messages sent by the ordering scenario.
    pub count: u32,
    /// How long to wait for replies before giving up.
    pub timeout: Duration,
}

impl ScenarioConfig {
    fn new(kind: ScenarioKind) -> Self {
        Self {
            kind,
            size: 0,
            count: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn echo() -> Self {
        Self::new(ScenarioKind::Echo)
    }

    pub fn array_buffer(size: usize) -> Self {
        Self {
            size,
            ..Self::new(ScenarioKind::ArrayBuffer)
        }
    }

    pub fn ordering(count: u32) -> Self {
        Self {
            count,
            ..Self::new(ScenarioKind::Ordering)
        }
    }

    pub fn close_after_send() -> Self {
        Self::new(ScenarioKind::CloseAfterSend)
    }

    pub fn lifecycle() -> Self {
        Self::new(ScenarioKind::Lifecycle)
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}
