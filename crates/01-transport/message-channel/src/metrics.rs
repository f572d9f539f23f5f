use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// What happened to a message arriving at an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeliveryOutcome {
    /// Appended to the receive queue.
    Queued,
    /// Handed to a receive callback.
    Delivered,
    /// Rejected on arrival because the destination is closed or gone.
    Dropped,
    /// Queued earlier, then thrown away when the port closed without a receiver.
    Discarded,
}

#[derive(Default)]
pub(crate) struct PortMetrics {
    queued: AtomicU32,
    delivered: AtomicU32,
    dropped: AtomicU32,
    discarded: AtomicU32,
}

impl PortMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Queued => {
                self.queued.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Discarded => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> PortMetricsSnapshot {
        PortMetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Per-endpoint delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortMetricsSnapshot {
    /// Messages accepted into the receive queue.
    pub queued: u32,
    /// Messages handed to a receive callback.
    pub delivered: u32,
    /// Messages rejected on arrival because the port was closed.
    pub dropped: u32,
    /// Queued messages thrown away when the port closed with no receiver.
    pub discarded: u32,
}

impl PortMetricsSnapshot {
    /// Messages accepted but not yet delivered or discarded.
    pub fn pending(&self) -> u32 {
        self.queued
            .saturating_sub(self.delivered)
            .saturating_sub(self.discarded)
    }
}
