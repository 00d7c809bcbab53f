//! IntegrationFanout - Concurrent Sink Delivery
//!
//! ## Responsibilities
//!
//! - Deliver each tag/event to every configured sink concurrently
//! - Isolate failures per sink: one failing or slow sink never prevents or
//!   delays the others
//! - Bound every sink attempt with a timeout; a timeout is an ordinary failure
//!
//! The fan-out owns no durable state. The sink set is fixed at startup from
//! configuration; a missing URL/connection disables that sink with a one-time
//! startup warning instead of a runtime error per event.

mod database;
mod indicator;
mod webhook;
mod xtrack;

pub use database::DatabaseSink;
pub use indicator::{GpoIndicator, Indicator, IndicatorSink};
pub use webhook::WebhookSink;
pub use xtrack::XtrackSink;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::tag_registry::TagRecord;

/// Upper bound on any single sink attempt; transports carry tighter
/// timeouts of their own.
const SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sink-level failure.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Per-sink outcome of one fan-out delivery.
#[derive(Debug, Clone)]
pub struct SinkResult {
    pub sink: &'static str,
    pub ok: bool,
    pub error: Option<String>,
}

/// One independently configured delivery target.
#[async_trait]
pub trait IntegrationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this sink receives non-tag events. Tag-only sinks (tracking
    /// webhook, indicator) return false.
    fn handles_events(&self) -> bool {
        true
    }

    async fn deliver_tag(&self, tag: &TagRecord) -> Result<(), SinkError>;

    async fn deliver_event(
        &self,
        device: &str,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Result<(), SinkError>;
}

/// Stateless dispatcher over the configured sink set.
pub struct IntegrationFanout {
    sinks: Vec<Arc<dyn IntegrationSink>>,
}

impl IntegrationFanout {
    pub fn new(sinks: Vec<Arc<dyn IntegrationSink>>) -> Self {
        Self { sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver a newly observed tag to every sink concurrently.
    pub async fn dispatch_tag(&self, tag: &TagRecord) -> Vec<SinkResult> {
        if self.sinks.is_empty() {
            return Vec::new();
        }
        tracing::debug!(
            epc = %tag.epc,
            sinks = self.sinks.len(),
            "Dispatching tag to sinks"
        );
        let attempts = self.sinks.iter().map(|sink| {
            let sink = sink.clone();
            let tag = tag.clone();
            async move { Self::guard(sink.name(), sink.deliver_tag(&tag)).await }
        });
        join_all(attempts).await
    }

    /// Deliver a non-tag event to every event-capable sink concurrently.
    pub async fn dispatch_event(
        &self,
        device: &str,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Vec<SinkResult> {
        let targets: Vec<_> = self
            .sinks
            .iter()
            .filter(|s| s.handles_events())
            .cloned()
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        tracing::debug!(
            device = %device,
            event_type = %event_type,
            sinks = targets.len(),
            "Dispatching event to sinks"
        );
        let attempts = targets.into_iter().map(|sink| {
            let device = device.to_string();
            let event_type = event_type.to_string();
            let event_data = event_data.clone();
            async move {
                Self::guard(
                    sink.name(),
                    sink.deliver_event(&device, &event_type, &event_data),
                )
                .await
            }
        });
        join_all(attempts).await
    }

    /// Run one sink attempt under the fan-out timeout, mapping any outcome
    /// to a logged `SinkResult`.
    async fn guard<F>(name: &'static str, attempt: F) -> SinkResult
    where
        F: std::future::Future<Output = Result<(), SinkError>>,
    {
        let outcome = tokio::time::timeout(SINK_TIMEOUT, attempt).await;
        match outcome {
            Ok(Ok(())) => SinkResult {
                sink: name,
                ok: true,
                error: None,
            },
            Ok(Err(e)) => {
                tracing::error!(sink = name, error = %e, "Sink delivery failed");
                SinkResult {
                    sink: name,
                    ok: false,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                tracing::error!(sink = name, timeout = ?SINK_TIMEOUT, "Sink delivery timed out");
                SinkResult {
                    sink: name,
                    ok: false,
                    error: Some(format!("timed out after {SINK_TIMEOUT:?}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn tag() -> TagRecord {
        TagRecord {
            epc: "000000000000000000000001".to_string(),
            tid: Some("E28011052000719000000001".to_string()),
            device: "R1".to_string(),
            antenna: Some(1),
            rssi: Some(-42),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    struct RecordingSink {
        tags: Mutex<Vec<String>>,
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                tags: Mutex::new(Vec::new()),
                events: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl IntegrationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
            self.tags.lock().unwrap().push(tag.epc.clone());
            Ok(())
        }

        async fn deliver_event(
            &self,
            _device: &str,
            event_type: &str,
            _event_data: &serde_json::Value,
        ) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event_type.to_string());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl IntegrationSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn deliver_tag(&self, _tag: &TagRecord) -> Result<(), SinkError> {
            Err(SinkError::Other("boom".to_string()))
        }

        async fn deliver_event(
            &self,
            _device: &str,
            _event_type: &str,
            _event_data: &serde_json::Value,
        ) -> Result<(), SinkError> {
            Err(SinkError::Other("boom".to_string()))
        }
    }

    struct TagOnlySink;

    #[async_trait]
    impl IntegrationSink for TagOnlySink {
        fn name(&self) -> &'static str {
            "tag_only"
        }

        fn handles_events(&self) -> bool {
            false
        }

        async fn deliver_tag(&self, _tag: &TagRecord) -> Result<(), SinkError> {
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

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let recording = RecordingSink::new();
        let fanout = IntegrationFanout::new(vec![
            Arc::new(FailingSink) as Arc<dyn IntegrationSink>,
            recording.clone(),
        ]);

        let results = fanout.dispatch_tag(&tag()).await;

        assert_eq!(results.len(), 2);
        let failing = results.iter().find(|r| r.sink == "failing").unwrap();
        assert!(!failing.ok);
        assert!(failing.error.as_deref().unwrap().contains("boom"));

        let ok = results.iter().find(|r| r.sink == "recording").unwrap();
        assert!(ok.ok);
        assert_eq!(recording.tags.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_event_dispatch_skips_tag_only_sinks() {
        let recording = RecordingSink::new();
        let fanout = IntegrationFanout::new(vec![
            Arc::new(TagOnlySink) as Arc<dyn IntegrationSink>,
            recording.clone(),
        ]);

        let results = fanout
            .dispatch_event("R1", "reading", &serde_json::json!(true))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sink, "recording");
        assert_eq!(recording.events.lock().unwrap().as_slice(), ["reading"]);
    }

    #[tokio::test]
    async fn test_empty_sink_set_is_a_noop() {
        let fanout = IntegrationFanout::new(Vec::new());
        assert!(fanout.dispatch_tag(&tag()).await.is_empty());
        assert!(fanout
            .dispatch_event("R1", "custom", &serde_json::json!({}))
            .await
            .is_empty());
    }
}
