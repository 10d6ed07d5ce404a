//! Wires the concrete driver, transport, process table and channels into
//! a pipeline run.

use serde::Serialize;
use tracing::warn;

use nacta_sync::{
    reset_environment, Pipeline, ResetReport, RunOutcome, RunReport, SourceRecord, SyncConfig,
};

use crate::driver::ChromiumLauncher;
use crate::notify::build_notifier;
use crate::processes::SystemProcesses;
use crate::transport::RsyncTransport;

/// Run every source once with the production collaborators.
pub async fn run_pipeline(config: &SyncConfig) -> RunReport {
    let launcher = ChromiumLauncher::new();
    let transport = RsyncTransport::from_config(&config.remote);
    let notifier = build_notifier(config);

    let unmapped = config.unmapped_sources();
    if !unmapped.is_empty() {
        let names: Vec<&str> = unmapped.iter().map(|s| s.logical_name.as_str()).collect();
        warn!("No remote destination for: {}", names.join(", "));
    }

    Pipeline::new(config, &launcher, &transport, &SystemProcesses, &notifier)
        .run()
        .await
}

/// Only sweep stale browser processes.
pub fn reset_only(config: &SyncConfig) -> ResetReport {
    reset_environment(&SystemProcesses, &config.reset_patterns)
}

/// Machine-readable run summary for `--json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub success: bool,
    pub sources: &'a [SourceRecord],
    pub outcome: &'a RunOutcome,
    pub notified: &'a [String],
}

impl<'a> RunSummary<'a> {
    pub fn new(report: &'a RunReport) -> Self {
        Self {
            success: report.is_full_success(),
            sources: &report.sources,
            outcome: &report.outcome,
            notified: &report.delivery.delivered,
        }
    }
}
