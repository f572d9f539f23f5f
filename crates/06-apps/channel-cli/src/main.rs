//! Command-line driver for the message-channel scenarios.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use channel_scenarios::{
    run_scenario, verify_report, ScenarioConfig, ScenarioEnv, ScenarioKind, ScenarioReport,
};
use clap::{Parser, ValueEnum};
use runtime_native::Looper;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Text rendering for scenario reports.
mod render {
    use channel_scenarios::ScenarioReport;
    use std::fmt::Write;

    pub fn report(report: &ScenarioReport) -> String {
        let mut out = String::new();
        writeln!(out, "scenario: {}", report.scenario.name()).expect("write scenario");
        if !report.sent.is_empty() {
            writeln!(out, "sent:     {}", preview(&report.sent)).expect("write sent");
        }
        if !report.received.is_empty() {
            writeln!(out, "received: {}", preview(&report.received)).expect("write received");
        }
        if let Some(matched) = report.bytes_match {
            let verdict = if matched { "match" } else { "MISMATCH" };
            writeln!(out, "bytes:    {} ({verdict})", report.payload_len).expect("write bytes");
        }
        for step in &report.steps {
            let written = match &step.error {
                Some(error) => writeln!(out, "  {:<18} {:?} !{error}", step.step, step.state),
                None => writeln!(out, "  {:<18} {:?}", step.step, step.state),
            };
            written.expect("write step");
        }
        let m = report.metrics;
        writeln!(
            out,
            "metrics:  queued={} delivered={} dropped={} discarded={}",
            m.queued, m.delivered, m.dropped, m.discarded
        )
        .expect("write metrics");
        writeln!(out, "elapsed:  {}us", report.elapsed_us).expect("write elapsed");
        out
    }

    fn preview(items: &[String]) -> String {
        const SHOWN: usize = 8;
        let mut shown: Vec<&str> = items.iter().take(SHOWN).map(String::as_str).collect();
        if items.len() > SHOWN {
            shown.push("...");
        }
        format!("[{}] ({} total)", shown.join(", "), items.len())
    }
}

/// Run a message-port scenario against scripted page realms.
#[derive(Parser, Debug)]
#[command(author, version, about = "Exercise entangled message ports", long_about = None)]
struct Cli {
    /// Scenario to run.
    #[arg(value_enum)]
    scenario: ScenarioArg,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Array-buffer size in bytes.
    #[arg(long, default_value_t = 512 * 1024)]
    size: usize,

    /// Number of messages for the ordering scenario.
    #[arg(long, default_value_t = 100)]
    count: u32,

    /// Text sent by the echo scenario.
    #[arg(long, default_value = "HELLO")]
    message: String,

    /// Milliseconds to wait for replies.
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    /// Echo text through a transferred port.
    Echo,
    /// Echo an array buffer and compare bytes.
    ArrayBuffer,
    /// Send COUNT messages and check their order.
    Ordering,
    /// Send two messages, close, and read the page title.
    CloseAfterSend,
    /// Walk a port through every state transition.
    Lifecycle,
}

impl From<ScenarioArg> for ScenarioKind {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Echo => ScenarioKind::Echo,
            ScenarioArg::ArrayBuffer => ScenarioKind::ArrayBuffer,
            ScenarioArg::Ordering => ScenarioKind::Ordering,
            ScenarioArg::CloseAfterSend => ScenarioKind::CloseAfterSend,
            ScenarioArg::Lifecycle => ScenarioKind::Lifecycle,
        }
    }
}

impl Cli {
    fn config(&self) -> ScenarioConfig {
        let config = match ScenarioKind::from(self.scenario) {
            ScenarioKind::Echo => ScenarioConfig::echo(),
            ScenarioKind::ArrayBuffer => ScenarioConfig::array_buffer(self.size),
            ScenarioKind::Ordering => ScenarioConfig::ordering(self.count),
            ScenarioKind::CloseAfterSend => ScenarioConfig::close_after_send(),
            ScenarioKind::Lifecycle => ScenarioConfig::lifecycle(),
        };
        config.with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config();

    let looper = Arc::new(Looper::spawn("channel-looper").context("failed to start looper thread")?);
    let env = ScenarioEnv::new(looper.clone());
    let report = run_scenario(&config, &cli.message, &env)?;
    let verdict = verify_report(&config, &cli.message, &report);
    drop(env);
    looper.shutdown();

    print_report(&report, cli.json)?;
    match verdict {
        Ok(()) => {
            info!(scenario = config.kind.name(), "scenario passed");
            Ok(())
        }
        Err(reason) => {
            warn!(scenario = config.kind.name(), %reason, "scenario failed");
            bail!("{} failed: {reason}", config.kind.name())
        }
    }
}

fn print_report(report: &ScenarioReport, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("failed to encode report")?;
        println!("{text}");
    } else {
        print!("{}", render::report(report));
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
