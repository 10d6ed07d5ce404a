//! Notification channels and notifier assembly.

pub mod email;
pub mod slack;

use nacta_sync::{Notifier, SyncConfig};

pub use email::EmailChannel;
pub use slack::SlackChannel;

/// One channel per configured destination. Unconfigured channels are skipped.
pub fn build_notifier(config: &SyncConfig) -> Notifier {
    let mut notifier = Notifier::new();
    if let Some(email) = &config.email {
        notifier = notifier.with_channel(Box::new(EmailChannel::new(email.clone())));
    }
    if let Some(slack) = &config.slack {
        notifier = notifier.with_channel(Box::new(SlackChannel::new(slack.clone())));
    }
    notifier
}
