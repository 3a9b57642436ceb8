//! Verdant controller — host entry point.
//!
//! Runs **one** control cycle against the mock rig and prints the cycle
//! summary as JSON, matching the deployment model where a scheduler
//! invokes the binary every ten minutes. Exit code 0 for a successful
//! cycle, 1 for a cycle that completed with actuator errors, 2 for a
//! wholesale failure.
//!
//! ```text
//! USAGE: verdant [config.json]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use verdant::adapters::log_sink::LogEventSink;
use verdant::adapters::memory_history::MemoryHistory;
use verdant::adapters::mock_rig::MockRig;
use verdant::app::service::ControlService;
use verdant::config::SystemConfig;

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            warn!("control cycle script failed: {e:#}");
            let failure = serde_json::json!({
                "success": false,
                "error": format!("{e:#}"),
                "timestamp": Utc::now(),
            });
            println!("{}", serde_json::to_string_pretty(&failure).unwrap_or_default());
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<bool> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SystemConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    let now = Utc::now();
    let today = Local::now().date_naive();

    let mut service = ControlService::new(config, today);
    let mut rig = MockRig::new(now.timestamp() as u64, now);
    let mut history = MemoryHistory::new();
    let mut sink = LogEventSink::new();

    // Roll up whatever history exists before deciding; on a cold start
    // this is a no-op and the rule engine runs with neutral trends.
    let rollups = service.run_rollup(&mut history);
    info!("stored {} KPI rollup(s)", rollups.len());

    // No advisory client is wired on the host — the core degrades to
    // rules-only exactly as it would if the advisor errored.
    let summary = service.run_cycle(&mut rig, &mut history, None, &mut sink, now)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to serialize cycle summary")?
    );

    Ok(summary.success)
}

/// Install the global subscriber. `RUST_LOG` controls verbosity; the
/// subscriber's log bridge picks up the `log` records the core emits.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
