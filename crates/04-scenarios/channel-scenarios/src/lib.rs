#![allow(missing_docs)]

mod checks;
mod collector;
mod config;
mod realms;
mod runner;

pub use checks::{
    verify_array_buffer, verify_close_after_send, verify_echo, verify_lifecycle, verify_ordering,
    verify_report, CheckResult,
};
pub use collector::Collector;
pub use config::{ScenarioConfig, ScenarioKind, DEFAULT_TIMEOUT};
pub use realms::{CountingRealm, EchoRealm, ReceivedWindowMessage, TitleMode, TitleRealm};
pub use runner::{run_scenario, ScenarioEnv, ScenarioReport, StateStep};

/// Suffix the scripted echo realm appends to text it sends back.
pub const ECHO_SUFFIX: &str = "from_js";

/// Deterministic byte pattern for array-buffer scenarios.
pub fn pattern_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
