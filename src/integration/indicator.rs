//! Audible indicator sink
//!
//! Tag-only, best-effort beep on every new tag. The default indicator pulses
//! a buzzer wired to a reader GPO pin through the device gateway.

use async_trait::async_trait;
use std::sync::Arc;

use super::{IntegrationSink, SinkError};
use crate::device_gateway::{DeviceGateway, OutputMode};
use crate::tag_registry::TagRecord;

/// Audible indicator collaborator.
#[async_trait]
pub trait Indicator: Send + Sync {
    async fn beep(&self) -> Result<(), SinkError>;
}

/// Indicator backed by a GPO-driven buzzer.
pub struct GpoIndicator {
    gateway: Arc<dyn DeviceGateway>,
    device: String,
    pin: u8,
    pulse_ms: u64,
}

impl GpoIndicator {
    pub fn new(gateway: Arc<dyn DeviceGateway>, device: String, pin: u8, pulse_ms: u64) -> Self {
        Self {
            gateway,
            device,
            pin,
            pulse_ms,
        }
    }
}

#[async_trait]
impl Indicator for GpoIndicator {
    async fn beep(&self) -> Result<(), SinkError> {
        let (ok, msg) = self
            .gateway
            .write_output(&self.device, self.pin, true, OutputMode::Pulsed, self.pulse_ms)
            .await;
        if ok {
            Ok(())
        } else {
            Err(SinkError::Other(
                msg.unwrap_or_else(|| "indicator write failed".to_string()),
            ))
        }
    }
}

pub struct IndicatorSink {
    indicator: Arc<dyn Indicator>,
}

impl IndicatorSink {
    pub fn new(indicator: Arc<dyn Indicator>) -> Self {
        Self { indicator }
    }
}

#[async_trait]
impl IntegrationSink for IndicatorSink {
    fn name(&self) -> &'static str {
        "indicator"
    }

    fn handles_events(&self) -> bool {
        false
    }

    async fn deliver_tag(&self, _tag: &TagRecord) -> Result<(), SinkError> {
        self.indicator.beep().await
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
