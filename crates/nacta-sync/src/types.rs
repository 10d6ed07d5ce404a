//! Core data types for sources, artifacts, and run outcomes.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Timestamp layout embedded in artifact file names.
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension given to every renamed artifact.
pub const ARTIFACT_EXTENSION: &str = "json";

/// A page to visit and the logical name its download is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub logical_name: String,
}

impl Source {
    pub fn new(url: impl Into<String>, logical_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            logical_name: logical_name.into(),
        }
    }
}

/// A downloaded file, renamed and waiting for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedArtifact {
    pub local_path: PathBuf,
    pub logical_name: String,
    pub captured_at: DateTime<Local>,
}

impl RetrievedArtifact {
    /// File name component of the local path.
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Deterministic artifact file name: `{logical_name}_{YYYYMMDD_HHMMSS}.json`.
pub fn artifact_file_name(logical_name: &str, at: &DateTime<Local>) -> String {
    format!(
        "{logical_name}_{}.{ARTIFACT_EXTENSION}",
        at.format(ARTIFACT_TIMESTAMP_FORMAT)
    )
}

/// One rule for finding the download trigger on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    /// XPath expression evaluated against the rendered document.
    pub query: String,
    pub description: String,
}

impl LocatorStrategy {
    pub fn xpath(query: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            description: description.into(),
        }
    }
}

/// The built-in strategy list, in priority order.
pub fn default_strategies() -> Vec<LocatorStrategy> {
    vec![
        LocatorStrategy::xpath("//button[contains(., 'JSON')]", "Button with JSON"),
        LocatorStrategy::xpath("//a[contains(., 'JSON')]", "Anchor with JSON"),
        LocatorStrategy::xpath(
            "//a[contains(text(), 'Download')]",
            "Anchor with Download text",
        ),
    ]
}

/// Lifecycle of a single source within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Pending,
    Retrieving,
    Transferring,
    Succeeded,
    Failed,
}

impl SourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SourceState::Succeeded | SourceState::Failed)
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_advance_to(self, next: SourceState) -> bool {
        use SourceState::*;
        matches!(
            (self, next),
            (Pending, Retrieving)
                | (Pending, Failed)
                | (Retrieving, Transferring)
                | (Retrieving, Failed)
                | (Transferring, Succeeded)
                | (Transferring, Failed)
        )
    }
}

/// A failed source and the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub logical_name: String,
    pub message: String,
}

/// Per-run accumulation of successes and failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
}

impl RunOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, artifact_name: impl Into<String>) {
        self.succeeded.push(artifact_name.into());
    }

    pub fn record_failure(&mut self, logical_name: impl Into<String>, message: impl Into<String>) {
        self.failed.push(SourceFailure {
            logical_name: logical_name.into(),
            message: message.into(),
        });
    }

    /// Number of sources accounted for.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True only when every source succeeded.
    pub fn is_full_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Report body lines: artifact names on success, `name: error` otherwise.
    pub fn report_lines(&self) -> Vec<String> {
        if self.is_full_success() {
            self.succeeded.clone()
        } else {
            self.failed
                .iter()
                .map(|f| format!("{}: {}", f.logical_name, f.message))
                .collect()
        }
    }
}
