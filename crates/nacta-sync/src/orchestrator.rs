//! Run orchestration: reset, then each source in turn, then one report.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::browser::BrowserLauncher;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::notify::{DeliveryReport, Notification, Notifier};
use crate::reset::{reset_environment, ProcessControl, ResetReport};
use crate::retrieval::Retriever;
use crate::transfer::{transfer_and_cleanup, TransferTransport};
use crate::types::{RunOutcome, Source, SourceState};

/// Final state of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub logical_name: String,
    pub state: SourceState,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reset: ResetReport,
    pub outcome: RunOutcome,
    pub sources: Vec<SourceRecord>,
    pub notification: Notification,
    pub delivery: DeliveryReport,
}

impl RunReport {
    pub fn is_full_success(&self) -> bool {
        self.outcome.is_full_success()
    }
}

/// Tracks one source through its state machine.
struct SourceTracker {
    logical_name: String,
    state: SourceState,
}

impl SourceTracker {
    fn new(logical_name: &str) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            state: SourceState::Pending,
        }
    }

    fn advance(&mut self, next: SourceState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "{}: {:?} -> {next:?}",
            self.logical_name,
            self.state
        );
        debug!(source = %self.logical_name, from = ?self.state, to = ?next, "state change");
        self.state = next;
    }

    fn into_record(self) -> SourceRecord {
        SourceRecord {
            logical_name: self.logical_name,
            state: self.state,
        }
    }
}

/// The collaborators a run needs, all borrowed for its duration.
pub struct Pipeline<'a> {
    config: &'a SyncConfig,
    launcher: &'a dyn BrowserLauncher,
    transport: &'a dyn TransferTransport,
    processes: &'a dyn ProcessControl,
    notifier: &'a Notifier,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a SyncConfig,
        launcher: &'a dyn BrowserLauncher,
        transport: &'a dyn TransferTransport,
        processes: &'a dyn ProcessControl,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            config,
            launcher,
            transport,
            processes,
            notifier,
        }
    }

    /// Run every configured source and send exactly one notification.
    ///
    /// Never fails: each source's error (or panic) is recorded against that
    /// source and the next source is processed regardless.
    pub async fn run(&self) -> RunReport {
        info!("NACTA sync started ({} sources)", self.config.sources.len());
        let reset = reset_environment(self.processes, &self.config.reset_patterns);

        let mut outcome = RunOutcome::new();
        let mut sources = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let mut tracker = SourceTracker::new(&source.logical_name);
            let result = AssertUnwindSafe(self.process_source(source, &mut tracker))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(SyncError::from_panic(&*panic)));

            match result {
                Ok(file_name) => {
                    tracker.advance(SourceState::Succeeded);
                    info!("{} succeeded: {file_name}", source.logical_name);
                    outcome.record_success(file_name);
                }
                Err(e) => {
                    tracker.advance(SourceState::Failed);
                    error!(
                        category = e.category(),
                        "{} failed: {e}", source.logical_name
                    );
                    outcome.record_failure(&source.logical_name, e.to_string());
                }
            }
            sources.push(tracker.into_record());
        }

        let notification = Notification::from_outcome(&outcome);
        info!(
            "NACTA sync finished: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        let delivery = self.notifier.dispatch(&notification).await;

        RunReport {
            reset,
            outcome,
            sources,
            notification,
            delivery,
        }
    }

    async fn process_source(
        &self,
        source: &Source,
        tracker: &mut SourceTracker,
    ) -> SyncResult<String> {
        tracker.advance(SourceState::Retrieving);
        let artifact = Retriever::new(self.config, self.launcher)
            .retrieve(source)
            .await?;

        tracker.advance(SourceState::Transferring);
        transfer_and_cleanup(artifact, &self.config.remote, self.transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_walks_forward() {
        let mut tracker = SourceTracker::new("A");
        tracker.advance(SourceState::Retrieving);
        tracker.advance(SourceState::Transferring);
        tracker.advance(SourceState::Succeeded);
        assert_eq!(tracker.into_record().state, SourceState::Succeeded);
    }
}
