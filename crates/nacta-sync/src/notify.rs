//! Run report formatting and fan-out to notification channels.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::future::join_all;
use tracing::{error, info};

use crate::error::NotifyError;
use crate::types::RunOutcome;

pub const SUCCESS_SUBJECT: &str = "NACTA Sync Successful";
pub const FAILURE_SUBJECT: &str = "NACTA Sync Partial Failure";

/// The single message sent at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub success: bool,
    pub timestamp: DateTime<Local>,
    pub lines: Vec<String>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, success: bool, lines: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            success,
            timestamp: Local::now(),
            lines,
        }
    }

    /// Build the report for a finished run.
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let success = outcome.is_full_success();
        let subject = if success { SUCCESS_SUBJECT } else { FAILURE_SUBJECT };
        Self::new(subject, success, outcome.report_lines())
    }

    pub fn status_label(&self) -> &'static str {
        if self.success {
            "SUCCESS ✓"
        } else {
            "FAILURE ✗"
        }
    }

    /// Status line, timestamp line, blank line, then the report lines.
    pub fn body(&self) -> String {
        format!(
            "Status: {}\nTimestamp: {}\n\n{}",
            self.status_label(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.lines.join("\n")
        )
    }

    pub fn email_subject(&self) -> String {
        let tag = if self.success { "OK" } else { "ALERT" };
        format!("[{tag}] {}", self.subject)
    }

    /// Chat rendering: bold subject, body in a code block.
    pub fn chat_text(&self) -> String {
        format!("*{}*\n```{}```", self.subject, self.body())
    }
}

/// One delivery path for run reports.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Per-channel delivery results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Sends a notification over every configured channel independently.
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver on all channels concurrently. A failing or slow channel never
    /// prevents the others from delivering; failures are logged, not retried.
    pub async fn dispatch(&self, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if self.channels.is_empty() {
            info!("No notification channels configured");
            return report;
        }

        let results = join_all(self.channels.iter().map(|c| c.deliver(notification))).await;
        for (channel, result) in self.channels.iter().zip(results) {
            match result {
                Ok(()) => {
                    info!("Notification sent via {}", channel.name());
                    report.delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    error!("{} failed: {e}", channel.name());
                    report.failed.push((channel.name().to_string(), e.to_string()));
                }
            }
        }
        report
    }
}
