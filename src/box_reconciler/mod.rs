//! BoxReconciler - Box Count Reconciliation
//!
//! Compares the live tag count against the declared box quantity and pulses
//! the approve/reject actuator line through the device gateway.
//!
//! ## State machine
//!
//! - `Idle`: no active box.
//! - Box-info notification classifies the box against the current count into
//!   `AwaitingCount` / `Reconciled` / `Overfilled`.
//! - A passive validation never writes the actuator; it schedules exactly one
//!   forced re-validation after a fixed delay (debounces transient under-count
//!   while a read cycle is still in progress).
//! - A forced validation approves on an exact count match and rejects on any
//!   mismatch; missing or invalid box info rejects immediately.
//! - Every action attempt resets the state to `Idle`, whether or not the
//!   actuator write succeeded.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::device_gateway::{DeviceGateway, OutputMode};
use crate::tag_registry::TagRegistry;

/// Reconciliation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoxPhase {
    Idle,
    AwaitingCount,
    Reconciled,
    Overfilled,
}

/// Declared box context. `qty == 0` always fails validation, which callers
/// rely on as a safety default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxInfo {
    pub box_id: Option<String>,
    pub qty: i64,
}

impl BoxInfo {
    fn is_valid(&self) -> bool {
        if self.box_id.is_none() {
            tracing::warn!("Box info is missing box_id");
            return false;
        }
        if self.qty <= 0 {
            tracing::warn!(qty = self.qty, "Box info has invalid quantity");
            return false;
        }
        true
    }
}

/// Parse a `boxId` or `boxId;qty` string. An unparseable quantity coerces to
/// 0 rather than failing the whole notification.
pub fn parse_box_info(raw: &str) -> BoxInfo {
    let parts: Vec<&str> = raw.split(';').collect();
    let mut box_id = None;
    let mut qty = 0i64;
    match parts.as_slice() {
        [id] => box_id = Some(id.to_string()),
        [id, qty_str] => {
            box_id = Some(id.to_string());
            match qty_str.parse::<i64>() {
                Ok(q) => qty = q,
                Err(_) => {
                    tracing::warn!(qty = %qty_str, raw = %raw, "Invalid quantity in box info");
                }
            }
        }
        _ => {
            tracing::warn!(raw = %raw, "Malformed box info string");
        }
    }
    BoxInfo { box_id, qty }
}

/// Actuator wiring for the approve/reject lines.
#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    pub approve_pin: u8,
    pub reject_pin: u8,
    pub pulse_ms: u64,
    pub recheck_delay: Duration,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            approve_pin: 1,
            reject_pin: 2,
            pulse_ms: 300,
            recheck_delay: Duration::from_secs(1),
        }
    }
}

struct Inner {
    info: Option<BoxInfo>,
    phase: BoxPhase,
    recheck: Option<JoinHandle<()>>,
}

pub struct BoxReconciler {
    registry: Arc<TagRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    actuator: ActuatorConfig,
    inner: Mutex<Inner>,
}

impl BoxReconciler {
    pub fn new(
        registry: Arc<TagRegistry>,
        gateway: Arc<dyn DeviceGateway>,
        actuator: ActuatorConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            actuator,
            inner: Mutex::new(Inner {
                info: None,
                phase: BoxPhase::Idle,
                recheck: None,
            }),
        }
    }

    fn classify(count: i64, expected: i64) -> BoxPhase {
        match count.cmp(&expected) {
            std::cmp::Ordering::Less => BoxPhase::AwaitingCount,
            std::cmp::Ordering::Equal => BoxPhase::Reconciled,
            std::cmp::Ordering::Greater => BoxPhase::Overfilled,
        }
    }

    /// Replace the active box context wholesale. Any pending re-check belongs
    /// to the prior box and is dropped.
    pub async fn update_box_info(&self, raw: &str) {
        let info = parse_box_info(raw);
        tracing::info!(box_id = ?info.box_id, qty = info.qty, "Updating box info");

        let phase = if info.box_id.is_some() && info.qty > 0 {
            let count = self.registry.count().await as i64;
            Self::classify(count, info.qty)
        } else {
            BoxPhase::Idle
        };

        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.recheck.take() {
            handle.abort();
        }
        inner.info = Some(info);
        inner.phase = phase;
    }

    /// Currently declared box, if any.
    pub async fn box_info(&self) -> Option<BoxInfo> {
        self.inner.lock().await.info.clone()
    }

    pub async fn phase(&self) -> BoxPhase {
        self.inner.lock().await.phase
    }

    /// Validate the current count against the declared box.
    ///
    /// Forced validation acts on the actuator and resets to `Idle`. Passive
    /// validation only classifies and schedules one forced re-check.
    pub async fn validate(self: &Arc<Self>, device: &str, force: bool) {
        if self.evaluate(device, force).await {
            self.schedule_recheck(device).await;
        }
    }

    /// Core transition step; returns true when a re-check should be scheduled.
    async fn evaluate(&self, device: &str, force: bool) -> bool {
        let info = self.inner.lock().await.info.clone();
        let info = match info {
            Some(info) if info.is_valid() => info,
            Some(_) => {
                self.reject(device).await;
                return false;
            }
            None => {
                tracing::warn!("No box info declared");
                self.reject(device).await;
                return false;
            }
        };

        let expected = info.qty;
        let count = self.registry.count().await as i64;
        let phase = Self::classify(count, expected);
        self.inner.lock().await.phase = phase;

        tracing::info!(
            device = %device,
            count,
            expected,
            force,
            phase = ?phase,
            "Validating box"
        );

        if force {
            if phase == BoxPhase::Reconciled {
                self.approve(device).await;
            } else {
                self.reject(device).await;
            }
            false
        } else {
            true
        }
    }

    /// Schedule exactly one forced re-validation; a newer schedule replaces
    /// any pending one.
    async fn schedule_recheck(self: &Arc<Self>, device: &str) {
        let this = Arc::clone(self);
        let device = device.to_string();
        let delay = self.actuator.recheck_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.inner.lock().await.recheck = None;
            this.evaluate(&device, true).await;
        });

        let mut inner = self.inner.lock().await;
        if let Some(prev) = inner.recheck.replace(handle) {
            prev.abort();
        }
    }

    async fn approve(&self, device: &str) {
        tracing::info!(device = %device, "Approving box");
        let (ok, msg) = self
            .gateway
            .write_output(
                device,
                self.actuator.approve_pin,
                true,
                OutputMode::Pulsed,
                self.actuator.pulse_ms,
            )
            .await;
        if ok {
            tracing::info!("GPO write successful for approving box");
        } else {
            tracing::error!(error = ?msg, "Failed to write GPO for approving box");
        }
        self.reset().await;
    }

    async fn reject(&self, device: &str) {
        tracing::info!(device = %device, "Rejecting box");
        let (ok, msg) = self
            .gateway
            .write_output(
                device,
                self.actuator.reject_pin,
                true,
                OutputMode::Pulsed,
                self.actuator.pulse_ms,
            )
            .await;
        if ok {
            tracing::info!("GPO write successful for rejecting box");
        } else {
            tracing::error!(error = ?msg, "Failed to write GPO for rejecting box");
        }
        self.reset().await;
    }

    /// Clear the box context and any pending re-check. Idempotent.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.recheck.take() {
            handle.abort();
        }
        inner.info = None;
        inner.phase = BoxPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_gateway::GatewayError;
    use crate::tag_registry::{IdentityField, TagRead};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct GpoWrite {
        device: String,
        pin: u8,
    }

    struct MockGateway {
        writes: StdMutex<Vec<GpoWrite>>,
        fail_writes: bool,
    }

    impl MockGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                writes: StdMutex::new(Vec::new()),
                fail_writes: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                writes: StdMutex::new(Vec::new()),
                fail_writes: true,
            })
        }

        fn writes(&self) -> Vec<GpoWrite> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceGateway for MockGateway {
        async fn connect_all(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn start_inventory(&self, _device: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn stop_inventory(&self, _device: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn write_output(
            &self,
            device: &str,
            pin: u8,
            _state: bool,
            _mode: OutputMode,
            _duration_ms: u64,
        ) -> (bool, Option<String>) {
            self.writes.lock().unwrap().push(GpoWrite {
                device: device.to_string(),
                pin,
            });
            if self.fail_writes {
                (false, Some("gpo offline".to_string()))
            } else {
                (true, None)
            }
        }

        fn connections_active(&self) -> bool {
            true
        }
    }

    async fn registry_with(count: usize) -> Arc<TagRegistry> {
        let registry = Arc::new(TagRegistry::new(IdentityField::Epc));
        for i in 0..count {
            let read = TagRead {
                epc: Some(format!("{:024}", i + 1)),
                ..TagRead::default()
            };
            registry.add(&read, "R1").await;
        }
        registry
    }

    fn reconciler(registry: Arc<TagRegistry>, gateway: Arc<MockGateway>) -> Arc<BoxReconciler> {
        Arc::new(BoxReconciler::new(
            registry,
            gateway,
            ActuatorConfig::default(),
        ))
    }

    #[test]
    fn test_parse_box_info() {
        assert_eq!(
            parse_box_info("BOX42;10"),
            BoxInfo {
                box_id: Some("BOX42".to_string()),
                qty: 10
            }
        );
        assert_eq!(
            parse_box_info("BOX42"),
            BoxInfo {
                box_id: Some("BOX42".to_string()),
                qty: 0
            }
        );
        // Unparseable quantity coerces to 0.
        assert_eq!(
            parse_box_info("abc;notanumber"),
            BoxInfo {
                box_id: Some("abc".to_string()),
                qty: 0
            }
        );
        // Too many segments leaves no box id.
        assert_eq!(
            parse_box_info("a;b;c"),
            BoxInfo {
                box_id: None,
                qty: 0
            }
        );
    }

    #[tokio::test]
    async fn test_forced_undercount_rejects_and_resets() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(5).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        assert_eq!(rec.phase().await, BoxPhase::AwaitingCount);

        rec.validate("R1", true).await;

        assert_eq!(
            gateway.writes(),
            vec![GpoWrite {
                device: "R1".to_string(),
                pin: 2
            }]
        );
        assert_eq!(rec.phase().await, BoxPhase::Idle);
        assert!(rec.box_info().await.is_none());
    }

    #[tokio::test]
    async fn test_forced_exact_count_approves_and_resets() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(10).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        assert_eq!(rec.phase().await, BoxPhase::Reconciled);

        rec.validate("R1", true).await;

        assert_eq!(
            gateway.writes(),
            vec![GpoWrite {
                device: "R1".to_string(),
                pin: 1
            }]
        );
        assert_eq!(rec.phase().await, BoxPhase::Idle);
        assert!(rec.box_info().await.is_none());
    }

    #[tokio::test]
    async fn test_forced_overfilled_rejects_and_resets() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(11).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        assert_eq!(rec.phase().await, BoxPhase::Overfilled);

        rec.validate("R1", true).await;

        assert_eq!(gateway.writes()[0].pin, 2);
        assert_eq!(rec.phase().await, BoxPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_validation_schedules_single_recheck() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(5).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        rec.validate("R1", false).await;

        // No actuator write yet; one re-check pending.
        assert!(gateway.writes().is_empty());
        assert!(rec.inner.lock().await.recheck.is_some());

        // A second passive validation replaces the pending re-check.
        rec.validate("R1", false).await;
        assert!(gateway.writes().is_empty());

        // After the delay the forced re-check fires once; count is still 5,
        // so the box is rejected.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(
            gateway.writes(),
            vec![GpoWrite {
                device: "R1".to_string(),
                pin: 2
            }]
        );
        assert_eq!(rec.phase().await, BoxPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_validation_at_exact_count_approves_after_recheck() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(10).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        rec.validate("R1", false).await;
        assert!(gateway.writes().is_empty());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(gateway.writes()[0].pin, 1);
        assert_eq!(rec.phase().await, BoxPhase::Idle);
    }

    #[tokio::test]
    async fn test_malformed_box_info_rejects_without_panicking() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(3).await, gateway.clone());

        rec.update_box_info("abc;notanumber").await;
        assert_eq!(rec.phase().await, BoxPhase::Idle);

        rec.validate("R1", true).await;
        assert_eq!(gateway.writes()[0].pin, 2);
        assert!(rec.box_info().await.is_none());
    }

    #[tokio::test]
    async fn test_validate_without_box_info_rejects() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(0).await, gateway.clone());

        rec.validate("R1", true).await;
        assert_eq!(gateway.writes()[0].pin, 2);
    }

    #[tokio::test]
    async fn test_actuator_failure_still_resets_state() {
        let gateway = MockGateway::failing();
        let rec = reconciler(registry_with(10).await, gateway.clone());

        rec.update_box_info("BOX1;10").await;
        rec.validate("R1", true).await;

        assert_eq!(gateway.writes().len(), 1);
        assert_eq!(rec.phase().await, BoxPhase::Idle);
        assert!(rec.box_info().await.is_none());
    }

    #[tokio::test]
    async fn test_new_box_info_replaces_prior_state() {
        let gateway = MockGateway::new();
        let rec = reconciler(registry_with(5).await, gateway.clone());

        rec.update_box_info("BOX1;5").await;
        assert_eq!(rec.phase().await, BoxPhase::Reconciled);

        rec.update_box_info("BOX2;10").await;
        assert_eq!(rec.phase().await, BoxPhase::AwaitingCount);
        assert_eq!(
            rec.box_info().await,
            Some(BoxInfo {
                box_id: Some("BOX2".to_string()),
                qty: 10
            })
        );
    }
}
