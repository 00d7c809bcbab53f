//! EventRouter - Inbound Event Classification
//!
//! ## Responsibilities
//!
//! - Classify inbound events (`tag` / `reading` / custom) once, at the boundary
//! - Apply registry side effects (dedupe on tag, device clear on cycle start,
//!   passive box validation on cycle stop)
//! - Hand every event to the integration fan-out as a detached task; callers
//!   never wait on sink I/O

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::box_reconciler::BoxReconciler;
use crate::integration::IntegrationFanout;
use crate::tag_registry::{TagRead, TagRegistry};
use crate::tasks::TaskSet;
use crate::{Error, Result};

/// One classified inbound event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A tag read.
    Tag(TagRead),
    /// Inventory cycle status: true = running, false = stopped.
    Reading(bool),
    /// Anything else passes through to the sinks unchanged.
    Custom { event_type: String, data: Value },
}

/// Generic event envelope as received on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// Truthiness of a loosely typed payload, for `reading` events that arrive
/// as booleans, numbers or strings depending on the reader model.
fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl EventPayload {
    /// Classify a wire envelope into a typed payload. Only tag payloads can
    /// fail: a tag event whose data is not a tag record is a validation error.
    pub fn classify(event_type: &str, data: Value) -> Result<Self> {
        match event_type {
            "tag" => {
                let read: TagRead = serde_json::from_value(data)
                    .map_err(|e| Error::Validation(format!("malformed tag payload: {e}")))?;
                Ok(EventPayload::Tag(read))
            }
            "reading" => Ok(EventPayload::Reading(json_truthy(&data))),
            other => Ok(EventPayload::Custom {
                event_type: other.to_string(),
                data,
            }),
        }
    }
}

pub struct EventRouter {
    registry: Arc<TagRegistry>,
    fanout: Arc<IntegrationFanout>,
    reconciler: Arc<BoxReconciler>,
    tasks: Arc<TaskSet>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<TagRegistry>,
        fanout: Arc<IntegrationFanout>,
        reconciler: Arc<BoxReconciler>,
        tasks: Arc<TaskSet>,
    ) -> Self {
        Self {
            registry,
            fanout,
            reconciler,
            tasks,
        }
    }

    /// Route one classified event from `device`.
    pub async fn on_event(&self, device: &str, payload: EventPayload) {
        match payload {
            EventPayload::Tag(read) => {
                self.on_tag(device, read).await;
            }
            EventPayload::Reading(running) => {
                tracing::info!(device = %device, running, "Reading event");
                if running {
                    self.on_start(device).await;
                } else {
                    self.on_stop(device).await;
                }
                self.dispatch_event(device, "reading", Value::Bool(running));
            }
            EventPayload::Custom { event_type, data } => {
                tracing::info!(device = %device, event_type = %event_type, "Device event");
                self.dispatch_event(device, &event_type, data);
            }
        }
    }

    /// Ingest one tag read. Returns true iff the read was accepted by the
    /// registry (new or repeat); only a new tag triggers the tag fan-out.
    pub async fn on_tag(&self, device: &str, read: TagRead) -> bool {
        let (is_new, tag) = self.registry.add(&read, device).await;
        match (is_new, tag) {
            (true, Some(tag)) => {
                tracing::info!(device = %device, epc = %tag.epc, "New tag");
                let fanout = self.fanout.clone();
                self.tasks.spawn(async move {
                    fanout.dispatch_tag(&tag).await;
                });
                true
            }
            (false, Some(_)) => true,
            _ => {
                tracing::warn!(device = %device, "Rejected malformed tag read");
                false
            }
        }
    }

    /// A new inventory cycle begins: stale tags from the previous cycle are
    /// discarded for this device.
    async fn on_start(&self, device: &str) {
        tracing::info!(device = %device, "Inventory cycle started");
        self.registry.remove_by_device(device).await;
    }

    /// The cycle stopped: kick off a passive box validation.
    async fn on_stop(&self, device: &str) {
        tracing::info!(device = %device, "Inventory cycle stopped");
        self.reconciler.validate(device, false).await;
    }

    fn dispatch_event(&self, device: &str, event_type: &str, data: Value) {
        let fanout = self.fanout.clone();
        let device = device.to_string();
        let event_type = event_type.to_string();
        self.tasks.spawn(async move {
            fanout.dispatch_event(&device, &event_type, &data).await;
        });
    }
}
