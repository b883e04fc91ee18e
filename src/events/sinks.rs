use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::{EventError, EventSink, PaymentEvent};

/// Structured log line per event
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, event: &PaymentEvent) -> Result<(), EventError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(
            target: "payment_events",
            event = event.name(),
            event_id = %event.event_id,
            payload = %payload,
            "Payment event"
        );
        Ok(())
    }
}

/// JSON POST of each event to a downstream consumer
pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, EventError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, event: &PaymentEvent) -> Result<(), EventError> {
        let response = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| EventError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EventError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
