//! Plain SMTP email channel.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use nacta_sync::config::EmailConfig;
use nacta_sync::{Notification, NotificationChannel, NotifyError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends the report through an unauthenticated relay, as the archive
/// network's internal mail host expects.
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_error(&self, message: impl std::fmt::Display) -> NotifyError {
        NotifyError::Build(self.name().to_string(), message.to_string())
    }

    pub fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| self.build_error(format!("EMAIL_FROM '{}': {e}", self.config.from)))?;
        if self.config.to.is_empty() {
            return Err(self.build_error("EMAIL_TO_LIST is empty"));
        }

        let mut builder = Message::builder()
            .from(from)
            .subject(notification.email_subject())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.config.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| self.build_error(format!("recipient '{to}': {e}")))?;
            builder = builder.to(mailbox);
        }
        builder
            .body(notification.body())
            .map_err(|e| self.build_error(e))
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "Email"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.server)
            .port(self.config.port)
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        mailer
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery {
                channel: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(to: &[&str]) -> EmailChannel {
        EmailChannel::new(EmailConfig {
            server: "127.0.0.1".into(),
            port: 25,
            from: "nacta@example.org".into(),
            to: to.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_message_headers() {
        let n = Notification::new("NACTA Sync Partial Failure", false, vec!["B: x".into()]);
        let message = channel(&["ops@example.org", "sec@example.org"])
            .build_message(&n)
            .unwrap();

        assert_eq!(
            message.headers().get_raw("Subject"),
            Some("[ALERT] NACTA Sync Partial Failure")
        );
        assert_eq!(message.envelope().to().len(), 2);
        assert_eq!(
            message.envelope().from().map(|a| a.to_string()),
            Some("nacta@example.org".to_string())
        );
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let n = Notification::new("s", true, vec![]);
        let err = channel(&[]).build_message(&n).unwrap_err();
        assert!(matches!(err, NotifyError::Build(ref c, _) if c == "Email"));
    }

    #[test]
    fn test_bad_recipient_rejected() {
        let n = Notification::new("s", true, vec![]);
        assert!(channel(&["not an address"]).build_message(&n).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_delivery_failure() {
        let mut ch = channel(&["ops@example.org"]);
        // Nothing listens on port 1.
        ch.config.port = 1;
        let n = Notification::new("s", true, vec![]);
        let err = ch.deliver(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery { .. }));
    }
}
