//! End-to-end box workflow: ingestion -> registry -> reconciliation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tunnel_connector::box_reconciler::{ActuatorConfig, BoxPhase, BoxReconciler};
use tunnel_connector::device_gateway::{DeviceGateway, GatewayError, OutputMode};
use tunnel_connector::event_router::{EventPayload, EventRouter};
use tunnel_connector::integration::IntegrationFanout;
use tunnel_connector::tag_registry::{IdentityField, TagRead, TagRegistry};
use tunnel_connector::tasks::TaskSet;

struct RecordingGateway {
    writes: Mutex<Vec<(String, u8)>>,
}

impl RecordingGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            writes: Mutex::new(Vec::new()),
        })
    }

    fn writes(&self) -> Vec<(String, u8)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceGateway for RecordingGateway {
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
        self.writes.lock().unwrap().push((device.to_string(), pin));
        (true, None)
    }

    fn connections_active(&self) -> bool {
        true
    }
}

struct Harness {
    router: EventRouter,
    registry: Arc<TagRegistry>,
    reconciler: Arc<BoxReconciler>,
    gateway: Arc<RecordingGateway>,
    tasks: Arc<TaskSet>,
}

fn harness() -> Harness {
    let registry = Arc::new(TagRegistry::new(IdentityField::Tid));
    let gateway = RecordingGateway::new();
    let reconciler = Arc::new(BoxReconciler::new(
        registry.clone(),
        gateway.clone(),
        ActuatorConfig {
            recheck_delay: Duration::from_millis(100),
            ..ActuatorConfig::default()
        },
    ));
    let fanout = Arc::new(IntegrationFanout::new(Vec::new()));
    let tasks = Arc::new(TaskSet::new());
    let router = EventRouter::new(registry.clone(), fanout, reconciler.clone(), tasks.clone());
    Harness {
        router,
        registry,
        reconciler,
        gateway,
        tasks,
    }
}

fn read(n: u32) -> TagRead {
    TagRead {
        epc: Some(format!("{n:024}")),
        tid: Some(format!("E2801105200071900000{n:04}")),
        ant: Some(1),
        rssi: Some(-45),
    }
}

#[tokio::test]
async fn full_box_cycle_approves_on_exact_count() {
    let h = harness();

    // Operator scans the box label.
    h.reconciler.update_box_info("BOX77;3").await;

    // Reader starts a cycle and streams tag reads, with duplicates.
    h.router.on_event("R1", EventPayload::Reading(true)).await;
    for n in 1..=3 {
        assert!(h.router.on_tag("R1", read(n)).await);
        assert!(h.router.on_tag("R1", read(n)).await); // duplicate
    }
    assert_eq!(h.registry.count().await, 3);

    // Forced validation approves and resets.
    h.reconciler.validate("R1", true).await;
    assert_eq!(h.gateway.writes(), vec![("R1".to_string(), 1)]);
    assert_eq!(h.reconciler.phase().await, BoxPhase::Idle);
    assert!(h.reconciler.box_info().await.is_none());

    h.tasks.shutdown().await;
}

#[tokio::test]
async fn cycle_stop_triggers_passive_validation_then_forced_recheck() {
    let h = harness();

    h.reconciler.update_box_info("BOX1;2").await;
    h.router.on_tag("R1", read(1)).await;

    // Stop with only 1 of 2 tags: passive validation, no actuator write yet.
    h.router.on_event("R1", EventPayload::Reading(false)).await;
    assert!(h.gateway.writes().is_empty());

    // The late tag arrives before the re-check fires.
    h.router.on_tag("R1", read(2)).await;

    // After the delay the forced re-check approves.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.gateway.writes(), vec![("R1".to_string(), 1)]);
    assert_eq!(h.reconciler.phase().await, BoxPhase::Idle);

    h.tasks.shutdown().await;
}

#[tokio::test]
async fn new_cycle_discards_previous_device_tags() {
    let h = harness();

    h.router.on_tag("R1", read(1)).await;
    h.router.on_tag("R2", read(2)).await;

    h.router.on_event("R1", EventPayload::Reading(true)).await;

    assert_eq!(h.registry.count().await, 1);
    assert_eq!(h.registry.get_all().await[0].device, "R2");

    h.tasks.shutdown().await;
}
