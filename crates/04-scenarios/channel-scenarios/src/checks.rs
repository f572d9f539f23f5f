use message_channel::PortState;

use crate::config::{ScenarioConfig, ScenarioKind};
use crate::runner::{ScenarioReport, StateStep};
use crate::ECHO_SUFFIX;

pub type CheckResult = Result<(), String>;

/// Dispatches to the check matching `config.kind`.
pub fn verify_report(config: &ScenarioConfig, message: &str, report: &ScenarioReport) -> CheckResult {
    if report.scenario != config.kind {
        return Err(format!(
            "report is for {} (expected {})",
            report.scenario.name(),
            config.kind.name()
        ));
    }
    match config.kind {
        ScenarioKind::Echo => verify_echo(report, message),
        ScenarioKind::ArrayBuffer => verify_array_buffer(report, config.size),
        ScenarioKind::Ordering => verify_ordering(report, config.count),
        ScenarioKind::CloseAfterSend => verify_close_after_send(report),
        ScenarioKind::Lifecycle => verify_lifecycle(report),
    }
}

pub fn verify_echo(report: &ScenarioReport, message: &str) -> CheckResult {
    let expected = format!("{message}{ECHO_SUFFIX}");
    match report.received.as_slice() {
        [reply] if *reply == expected => Ok(()),
        [] => Err("no reply received".into()),
        other => Err(format!("received {other:?} (expected [{expected:?}])")),
    }
}

pub fn verify_array_buffer(report: &ScenarioReport, size: usize) -> CheckResult {
    if report.payload_len != size {
        return Err(format!("sent {} bytes (expected {size})", report.payload_len));
    }
    match report.bytes_match {
        Some(true) => Ok(()),
        Some(false) if report.received.is_empty() => Err("no reply received".into()),
        Some(false) => Err(format!("echoed bytes differ: {:?}", report.received)),
        None => Err("report carries no byte comparison".into()),
    }
}

pub fn verify_ordering(report: &ScenarioReport, count: u32) -> CheckResult {
    if report.received.len() != report.sent.len() || report.sent.len() as u64 != u64::from(count) {
        return Err(format!(
            "sent {} received {} (expected {count} each)",
            report.sent.len(),
            report.received.len()
        ));
    }
    for (index, (sent, received)) in report.sent.iter().zip(&report.received).enumerate() {
        let expected = format!("{sent}{ECHO_SUFFIX}");
        if *received != expected {
            return Err(format!(
                "message {index} arrived as {received:?} (expected {expected:?})"
            ));
        }
    }
    Ok(())
}

pub fn verify_close_after_send(report: &ScenarioReport) -> CheckResult {
    let concatenated: String = report.sent.concat();
    match report.received.as_slice() {
        [title] if *title == concatenated => {}
        other => {
            return Err(format!(
                "page title {other:?} (expected {concatenated:?})"
            ))
        }
    }
    match report.steps.last() {
        Some(step) if step.state == PortState::Closed => Ok(()),
        other => Err(format!("port not closed after close(): {other:?}")),
    }
}

fn expected_lifecycle() -> Vec<StateStep> {
    let step = |step: &str, state: PortState, error: Option<&str>| StateStep {
        step: step.to_owned(),
        state,
        error: error.map(str::to_owned),
    };
    vec![
        step("created", PortState::Pending, None),
        step("post", PortState::Started, None),
        step(
            "transfer-started",
            PortState::Started,
            Some("Port is already started"),
        ),
        step("transfer-pending", PortState::Transferred, None),
        step(
            "close-transferred",
            PortState::Transferred,
            Some("Port is already transferred"),
        ),
        step("close", PortState::Closed, None),
        step(
            "post-after-close",
            PortState::Closed,
            Some("Port is already closed"),
        ),
    ]
}

pub fn verify_lifecycle(report: &ScenarioReport) -> CheckResult {
    let expected = expected_lifecycle();
    if report.steps.len() != expected.len() {
        return Err(format!(
            "recorded {} steps (expected {})",
            report.steps.len(),
            expected.len()
        ));
    }
    for (actual, expected) in report.steps.iter().zip(&expected) {
        if actual != expected {
            return Err(format!("step {}: got {actual:?}, expected {expected:?}", expected.step));
        }
    }
    Ok(())
}
