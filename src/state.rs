//! Application state
//!
//! Holds configuration and the shared components. Everything is wired once at
//! process start and passed by reference; there are no ambient globals.

use std::sync::Arc;

use crate::box_reconciler::BoxReconciler;
use crate::device_gateway::DeviceGateway;
use crate::event_router::EventRouter;
use crate::persistence::{EventRepository, TagRepository};
use crate::tag_registry::{IdentityField, TagRegistry};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// SQLite URL; unset disables the database integration
    pub database_url: Option<String>,
    /// Generic webhook URL; unset disables the webhook integration
    pub webhook_url: Option<String>,
    /// Webhook/Xtrack transport timeout (seconds)
    pub webhook_timeout_secs: u64,
    /// Webhook retry budget per event
    pub webhook_max_retries: u32,
    /// Xtrack tracking webhook URL; unset disables the Xtrack integration
    pub xtrack_url: Option<String>,
    /// Audible indicator on new tags
    pub beep: bool,
    /// Reader whose GPO drives the buzzer
    pub indicator_device: String,
    /// Buzzer GPO pin
    pub indicator_pin: u8,
    /// Identity field used by the tag registry
    pub tag_identity: IdentityField,
    /// Tag age-out interval (seconds); unset disables tag aging
    pub clear_old_tags_interval: Option<u64>,
    /// Persisted-row retention (days); unset disables the purge
    pub storage_days: Option<i64>,
    /// Approve actuator line
    pub approve_pin: u8,
    /// Reject actuator line
    pub reject_pin: u8,
    /// Actuator pulse duration (milliseconds)
    pub gpo_pulse_ms: u64,
    /// Delay before a passive validation re-checks with force (milliseconds)
    pub recheck_delay_ms: u64,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT").unwrap_or(8080),
            database_url: env_opt("DATABASE_URL"),
            webhook_url: env_opt("WEBHOOK_URL"),
            webhook_timeout_secs: env_parse("WEBHOOK_TIMEOUT_SECS").unwrap_or(1),
            webhook_max_retries: env_parse("WEBHOOK_MAX_RETRIES").unwrap_or(1),
            xtrack_url: env_opt("XTRACK_URL"),
            beep: env_parse("BEEP").unwrap_or(false),
            indicator_device: env_opt("INDICATOR_DEVICE").unwrap_or_else(|| "tunnel".to_string()),
            indicator_pin: env_parse("INDICATOR_PIN").unwrap_or(3),
            tag_identity: env_parse("TAG_IDENTITY").unwrap_or(IdentityField::Tid),
            clear_old_tags_interval: env_parse("CLEAR_OLD_TAGS_INTERVAL"),
            storage_days: env_parse("STORAGE_DAYS"),
            approve_pin: env_parse("APPROVE_PIN").unwrap_or(1),
            reject_pin: env_parse("REJECT_PIN").unwrap_or(2),
            gpo_pulse_ms: env_parse("GPO_PULSE_MS").unwrap_or(300),
            recheck_delay_ms: env_parse("RECHECK_DELAY_MS").unwrap_or(1000),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<TagRegistry>,
    pub router: Arc<EventRouter>,
    pub reconciler: Arc<BoxReconciler>,
    pub gateway: Arc<dyn DeviceGateway>,
    pub tag_repo: Option<TagRepository>,
    pub event_repo: Option<EventRepository>,
}
