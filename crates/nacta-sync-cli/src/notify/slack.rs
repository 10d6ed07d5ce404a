//! Slack incoming-webhook channel.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use nacta_sync::config::SlackConfig;
use nacta_sync::{Notification, NotificationChannel, NotifyError};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackChannel {
    client: reqwest::Client,
    config: SlackConfig,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn payload(&self, notification: &Notification) -> serde_json::Value {
        json!({
            "channel": self.config.channel,
            "text": notification.chat_text(),
        })
    }

    fn failure(&self, message: impl std::fmt::Display) -> NotifyError {
        NotifyError::Delivery {
            channel: self.name().to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "Slack"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.client
            .post(&self.config.webhook_url)
            .json(&self.payload(notification))
            .send()
            .await
            .map_err(|e| self.failure(e))?
            .error_for_status()
            .map_err(|e| self.failure(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(url: String) -> SlackChannel {
        SlackChannel::new(SlackConfig {
            webhook_url: url,
            channel: "#nacta-alerts".into(),
        })
    }

    #[test]
    fn test_payload_shape() {
        let n = Notification::new("NACTA Sync Successful", true, vec!["A.json".into()]);
        let payload = channel("http://unused".into()).payload(&n);
        assert_eq!(payload["channel"], "#nacta-alerts");
        let text = payload["text"].as_str().unwrap();
        assert!(text.starts_with("*NACTA Sync Successful*\n```Status: SUCCESS"));
        assert!(text.ends_with("A.json```"));
    }

    #[tokio::test]
    async fn test_delivers_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T000/B000"))
            .and(body_partial_json(json!({ "channel": "#nacta-alerts" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let n = Notification::new("NACTA Sync Partial Failure", false, vec!["B: x".into()]);
        channel(format!("{}/services/T000/B000", server.uri()))
            .deliver(&n)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_error_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let n = Notification::new("s", true, vec![]);
        let err = channel(server.uri()).deliver(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery { ref channel, .. } if channel == "Slack"));
    }
}
