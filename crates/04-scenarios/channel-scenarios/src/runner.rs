use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use frame_bridge::MainFrameBridge;
use message_channel::{
    Executor, InlineExecutor, MessageHub, MessagePayload, MessagePort, PortMetricsSnapshot,
    PortState,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::collector::Collector;
use crate::config::{ScenarioConfig, ScenarioKind};
use crate::realms::{CountingRealm, EchoRealm, TitleMode, TitleRealm};
use crate::pattern_bytes;

const ECHO_URL: &str = "https://echo.scenario.test/echo.html";
const TITLE_URL: &str = "https://title.scenario.test/title.html";
const COUNTING_URL: &str = "https://count.scenario.test/count.html";

/// Hub, bridge, and the executor app-side callbacks run on.
pub struct ScenarioEnv {
    pub hub: MessageHub,
    pub bridge: MainFrameBridge,
    pub executor: Arc<dyn Executor>,
}

impl ScenarioEnv {
    /// Uses `executor` for app callbacks and as the hub's default.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let hub = MessageHub::builder()
            .default_executor(Arc::clone(&executor))
            .build();
        let bridge = MainFrameBridge::new(hub.clone());
        Self {
            hub,
            bridge,
            executor,
        }
    }

    pub fn inline() -> Self {
        Self::new(Arc::new(InlineExecutor))
    }
}

/// State of the port under test after one lifecycle step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateStep {
    pub step: String,
    pub state: PortState,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub sent: Vec<String>,
    pub received: Vec<String>,
    pub payload_len: usize,
    pub bytes_match: Option<bool>,
    pub steps: Vec<StateStep>,
    pub metrics: PortMetricsSnapshot,
    pub elapsed_us: u64,
}

impl ScenarioReport {
    fn new(scenario: ScenarioKind) -> Self {
        Self {
            scenario,
            sent: Vec::new(),
            received: Vec::new(),
            payload_len: 0,
            bytes_match: None,
            steps: Vec::new(),
            metrics: PortMetricsSnapshot::default(),
            elapsed_us: 0,
        }
    }
}

/// Runs one scenario end to end. `message` is the echo scenario's text.
pub fn run_scenario(
    config: &ScenarioConfig,
    message: &str,
    env: &ScenarioEnv,
) -> Result<ScenarioReport> {
    info!(scenario = config.kind.name(), executor = env.executor.name(), "running scenario");
    let started = Instant::now();
    let mut report = match config.kind {
        ScenarioKind::Echo => run_echo(config, message, env),
        ScenarioKind::ArrayBuffer => run_array_buffer(config, env),
        ScenarioKind::Ordering => run_ordering(config, env),
        ScenarioKind::CloseAfterSend => run_close_after_send(config, env),
        ScenarioKind::Lifecycle => run_lifecycle(env),
    }
    .with_context(|| format!("scenario {} failed", config.kind.name()))?;
    report.elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    debug!(scenario = config.kind.name(), elapsed_us = report.elapsed_us, "scenario finished");
    Ok(report)
}

/// Hands a fresh channel's second port to the page and returns the first.
fn connect_page(env: &ScenarioEnv) -> Result<MessagePort> {
    let (app, page) = env.hub.create_channel().into_ports();
    env.bridge
        .post_message_to_main_frame("connect", "*", &[page])
        .context("transferring port to page")?;
    Ok(app)
}

fn listen(port: &MessagePort, env: &ScenarioEnv) -> Result<Arc<Collector<MessagePayload>>> {
    let collector = Collector::new();
    let sink = Arc::clone(&collector);
    port.set_message_callback(
        move |message| sink.push(message.payload().clone()),
        Some(Arc::clone(&env.executor)),
    )
    .context("listening on app port")?;
    Ok(collector)
}

fn describe(payload: &MessagePayload) -> String {
    match payload {
        MessagePayload::Text(text) => text.clone(),
        MessagePayload::ArrayBuffer(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn run_echo(config: &ScenarioConfig, message: &str, env: &ScenarioEnv) -> Result<ScenarioReport> {
    env.bridge.load(ECHO_URL, EchoRealm::new());
    let app = connect_page(env)?;
    let replies = listen(&app, env)?;
    app.post_message(message, &[]).context("posting to page")?;

    let mut report = ScenarioReport::new(ScenarioKind::Echo);
    report.sent.push(message.to_owned());
    report.received = replies
        .wait_for(1, config.timeout)
        .iter()
        .map(describe)
        .collect();
    report.payload_len = message.len();
    report.metrics = app.metrics();
    Ok(report)
}

fn run_array_buffer(config: &ScenarioConfig, env: &ScenarioEnv) -> Result<ScenarioReport> {
    env.bridge.load(ECHO_URL, EchoRealm::new());
    let app = connect_page(env)?;
    let replies = listen(&app, env)?;
    let payload = pattern_bytes(config.size);
    app.post_message(payload.clone(), &[])
        .context("posting array buffer")?;

    let received = replies.wait_for(1, config.timeout);
    let mut report = ScenarioReport::new(ScenarioKind::ArrayBuffer);
    report.sent.push(describe(&MessagePayload::array_buffer(payload.clone())));
    report.received = received.iter().map(describe).collect();
    report.payload_len = payload.len();
    report.bytes_match = Some(
        received
            .first()
            .and_then(MessagePayload::as_array_buffer)
            .is_some_and(|echoed| echoed == payload.as_slice()),
    );
    report.metrics = app.metrics();
    Ok(report)
}

fn run_ordering(config: &ScenarioConfig, env: &ScenarioEnv) -> Result<ScenarioReport> {
    env.bridge.load(ECHO_URL, EchoRealm::new());
    let app = connect_page(env)?;
    let replies = listen(&app, env)?;

    let mut report = ScenarioReport::new(ScenarioKind::Ordering);
    for i in 0..config.count {
        let text = i.to_string();
        app.post_message(text.as_str(), &[])
            .with_context(|| format!("posting message {i}"))?;
        report.sent.push(text);
    }
    let expected = usize::try_from(config.count).unwrap_or(usize::MAX);
    report.received = replies
        .wait_for(expected, config.timeout)
        .iter()
        .map(describe)
        .collect();
    report.metrics = app.metrics();
    Ok(report)
}

fn run_close_after_send(config: &ScenarioConfig, env: &ScenarioEnv) -> Result<ScenarioReport> {
    let realm = TitleRealm::new(TitleMode::Channel);
    env.bridge.load(TITLE_URL, realm.clone());
    let app = connect_page(env)?;

    let mut report = ScenarioReport::new(ScenarioKind::CloseAfterSend);
    for text in ["2", "3"] {
        app.post_message(text, &[]).context("posting before close")?;
        report.sent.push(text.to_owned());
    }
    app.close().context("closing app port")?;
    report.steps.push(StateStep {
        step: "close".to_owned(),
        state: app.state(),
        error: None,
    });
    report.received.push(realm.wait_for_title("23", config.timeout));
    report.metrics = app.metrics();
    Ok(report)
}

fn record<E: Display>(report: &mut ScenarioReport, step: &str, port: &MessagePort, outcome: Result<(), E>) {
    report.steps.push(StateStep {
        step: step.to_owned(),
        state: port.state(),
        error: outcome.err().map(|err| err.to_string()),
    });
}

fn run_lifecycle(env: &ScenarioEnv) -> Result<ScenarioReport> {
    env.bridge.load(COUNTING_URL, CountingRealm::new());
    let mut report = ScenarioReport::new(ScenarioKind::Lifecycle);
    let (app, _peer) = env.hub.create_channel().into_ports();
    let (carrier, _carrier_peer) = env.hub.create_channel().into_ports();
    let (spare, _spare_peer) = env.hub.create_channel().into_ports();

    record::<String>(&mut report, "created", &app, Ok(()));
    let outcome = app.post_message("hello", &[]);
    record(&mut report, "post", &app, outcome);
    let outcome = carrier.post_message("carry", &[app.clone()]).map_err(|e| e.message());
    record(&mut report, "transfer-started", &app, outcome);
    let outcome = env
        .bridge
        .post_message_to_main_frame("carry", "*", &[spare.clone()]);
    record(&mut report, "transfer-pending", &spare, outcome);
    let outcome = spare.close().map_err(|e| e.message());
    record(&mut report, "close-transferred", &spare, outcome);
    let outcome = app.close();
    record(&mut report, "close", &app, outcome);
    let outcome = app.post_message("late", &[]).map_err(|e| e.message());
    record(&mut report, "post-after-close", &app, outcome);

    report.metrics = app.metrics();
    Ok(report)
}
