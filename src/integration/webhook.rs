//! Generic webhook sink
//!
//! POSTs `{device, event_type, event_data}` to a configured URL with a short
//! timeout and a small fixed retry budget. Delivery is at-most-once; after the
//! retry budget is spent the event is dropped with a logged error.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{IntegrationSink, SinkError};
use crate::tag_registry::TagRecord;

pub struct WebhookSink {
    client: Client,
    url: String,
    max_retries: u32,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration, max_retries: u32) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            max_retries,
        })
    }

    async fn post(&self, body: serde_json::Value) -> Result<(), SinkError> {
        let mut last_err: Option<SinkError> = None;
        for attempt in 0..=self.max_retries {
            match self.client.post(&self.url).json(&body).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(_) => return Ok(()),
                    Err(e) => last_err = Some(e.into()),
                },
                Err(e) => last_err = Some(e.into()),
            }
            if attempt < self.max_retries {
                tracing::warn!(url = %self.url, attempt = attempt + 1, "Webhook post failed, retrying");
            }
        }
        Err(last_err.unwrap_or_else(|| SinkError::Other("webhook post failed".to_string())))
    }
}

#[async_trait]
impl IntegrationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
        self.post(json!({
            "device": tag.device,
            "event_type": "tag",
            "event_data": tag,
        }))
        .await
    }

    async fn deliver_event(
        &self,
        device: &str,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Result<(), SinkError> {
        self.post(json!({
            "device": device,
            "event_type": event_type,
            "event_data": event_data,
        }))
        .await
    }
}
