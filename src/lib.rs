//! Tunnel Connector
//!
//! RFID tunnel connector service.
//!
//! ## Architecture
//!
//! 1. TagRegistry - deduplicating, time-bounded store of observed tags
//! 2. EventRouter - classifies inbound reader events and updates the registry
//! 3. IntegrationFanout - concurrent delivery to database/webhook/indicator sinks
//! 4. BoxReconciler - compares tag count against a declared box quantity and
//!    pulses the approve/reject actuator
//! 5. ConnectionSupervisor - keeps reader connections alive with backoff
//! 6. RetentionSweeper - ages out stale tags and purges old persisted rows
//! 7. WebAPI - REST endpoints (ingestion, reports, box workflow)
//!
//! ## Design Principles
//!
//! - TagRegistry is the single source of truth for live tag state
//! - Sink failures are isolated per sink and never reach the event producer
//! - All background work runs on an explicit, cancellable task set

pub mod box_reconciler;
pub mod connection_supervisor;
pub mod device_gateway;
pub mod error;
pub mod event_router;
pub mod integration;
pub mod persistence;
pub mod retention;
pub mod state;
pub mod tag_registry;
pub mod tasks;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
