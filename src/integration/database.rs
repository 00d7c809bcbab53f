//! Database sink
//!
//! Persists new tags and device events through the sqlx repositories.

use async_trait::async_trait;

use super::{IntegrationSink, SinkError};
use crate::persistence::{EventRepository, TagRepository};
use crate::tag_registry::TagRecord;

pub struct DatabaseSink {
    tags: TagRepository,
    events: EventRepository,
}

impl DatabaseSink {
    pub fn new(tags: TagRepository, events: EventRepository) -> Self {
        Self { tags, events }
    }
}

#[async_trait]
impl IntegrationSink for DatabaseSink {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn deliver_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
        self.tags.insert(tag).await?;
        Ok(())
    }

    async fn deliver_event(
        &self,
        device: &str,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event_data)?;
        self.events.insert(device, event_type, &payload).await?;
        Ok(())
    }
}
