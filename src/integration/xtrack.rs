//! Xtrack tracking-webhook sink
//!
//! Tag-only sink for the Xtrack tracking system: posts the tag record as-is.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{IntegrationSink, SinkError};
use crate::tag_registry::TagRecord;

pub struct XtrackSink {
    client: Client,
    url: String,
}

impl XtrackSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl IntegrationSink for XtrackSink {
    fn name(&self) -> &'static str {
        "xtrack"
    }

    fn handles_events(&self) -> bool {
        false
    }

    async fn deliver_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
        self.client
            .post(&self.url)
            .json(tag)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn deliver_event(
        &self,
        _device: &str,
        _event_type: &str,
        _event_data: &serde_json::Value,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}
