//! NACTA Sync: retrieve browser-only downloads and relay them to an archive host.
//!
//! The pipeline resets stale browser processes, drives one isolated browser
//! session per source to trigger and capture its download, hands each
//! artifact to a remote transport (deleting it locally only once the
//! transfer succeeded), and sends a single report covering every source.
//!
//! Concrete browser, transport, process, and notification implementations
//! live in `nacta-sync-cli`; this crate only depends on their traits.

pub mod browser;
pub mod config;
pub mod error;
pub mod layout;
pub mod locator;
pub mod notify;
pub mod orchestrator;
pub mod reset;
pub mod retrieval;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transfer;
pub mod types;

pub use browser::{BrowserLauncher, BrowserSession, ElementHandle, SessionOptions};
pub use config::{SettleMode, SyncConfig, Timeouts};
pub use error::{BrowserError, ConfigError, NotifyError, SyncError, SyncResult, TransferError};
pub use layout::Layout;
pub use notify::{DeliveryReport, Notification, NotificationChannel, Notifier};
pub use orchestrator::{Pipeline, RunReport, SourceRecord};
pub use reset::{reset_environment, ProcessControl, ProcessInfo, ResetReport};
pub use transfer::{transfer_and_cleanup, TransferTransport};
pub use types::*;
