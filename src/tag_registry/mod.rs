//! TagRegistry - Deduplicating Tag Store
//!
//! ## Responsibilities
//!
//! - Keep at most one live entry per identity key (TID by default, EPC fallback)
//! - Update `last_seen` and signal fields in place on repeat reads
//! - Serve counts/projections for the report and box-reconciliation paths
//!
//! All operations go through a single `RwLock`, so they are linearizable with
//! respect to each other. Scans are O(n), which is fine at the expected scale
//! (thousands of concurrently live tags).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Which field identifies a tag in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    /// Chip-level serial; falls back to EPC when the read carries no TID.
    Tid,
    /// EPC only.
    Epc,
}

impl std::str::FromStr for IdentityField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tid" => Ok(IdentityField::Tid),
            "epc" => Ok(IdentityField::Epc),
            other => Err(format!("unknown identity field: {other}")),
        }
    }
}

/// Queryable tag fields for lookups and distinct counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Epc,
    Tid,
    Device,
    Antenna,
}

impl std::str::FromStr for TagField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epc" => Ok(TagField::Epc),
            "tid" => Ok(TagField::Tid),
            "device" => Ok(TagField::Device),
            "antenna" | "ant" => Ok(TagField::Antenna),
            other => Err(format!("unknown tag field: {other}")),
        }
    }
}

/// One inbound tag read, as received from a reader or the HTTP surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagRead {
    pub epc: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub ant: Option<i32>,
    #[serde(default)]
    pub rssi: Option<i32>,
}

/// One live registry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRecord {
    pub epc: String,
    pub tid: Option<String>,
    pub device: String,
    pub antenna: Option<i32>,
    pub rssi: Option<i32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Trim and uppercase a hex identifier; empty values are treated as absent.
fn normalize(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_ascii_uppercase())
    }
}

/// Deduplicating tag store.
pub struct TagRegistry {
    identity: IdentityField,
    tags: RwLock<HashMap<String, TagRecord>>,
}

impl TagRegistry {
    /// Create a registry keyed by the given identity field.
    pub fn new(identity: IdentityField) -> Self {
        Self {
            identity,
            tags: RwLock::new(HashMap::new()),
        }
    }

    /// Identity key for a record, per the configured identity field.
    fn identity_of(&self, epc: &str, tid: Option<&str>) -> String {
        match self.identity {
            IdentityField::Tid => tid.map(str::to_owned).unwrap_or_else(|| epc.to_owned()),
            IdentityField::Epc => epc.to_owned(),
        }
    }

    /// Add a tag read for `device`.
    ///
    /// Returns:
    /// - `(true, Some(record))` when a new entry was created
    /// - `(false, Some(record))` when an existing entry was refreshed in place
    /// - `(false, None)` when the read is malformed (missing identity field)
    pub async fn add(&self, read: &TagRead, device: &str) -> (bool, Option<TagRecord>) {
        let Some(epc) = normalize(read.epc.as_deref()) else {
            return (false, None);
        };
        let tid = normalize(read.tid.as_deref());
        let key = self.identity_of(&epc, tid.as_deref());
        let now = Utc::now();

        let mut tags = self.tags.write().await;
        if let Some(existing) = tags.get_mut(&key) {
            // A stored entry whose own identity no longer matches its key is a
            // programming bug, not an operational error.
            let stored_key = self.identity_of(&existing.epc, existing.tid.as_deref());
            if stored_key != key {
                tracing::error!(
                    key = %key,
                    stored_key = %stored_key,
                    "TagRegistry invariant violated: entry identity does not match its key (bug)"
                );
                debug_assert_eq!(stored_key, key);
            }

            existing.last_seen = now;
            if read.ant.is_some() {
                existing.antenna = read.ant;
            }
            if read.rssi.is_some() {
                existing.rssi = read.rssi;
            }
            (false, Some(existing.clone()))
        } else {
            let record = TagRecord {
                epc,
                tid,
                device: device.to_string(),
                antenna: read.ant,
                rssi: read.rssi,
                first_seen: now,
                last_seen: now,
            };
            tags.insert(key, record.clone());
            (true, Some(record))
        }
    }

    /// Remove all entries observed by `device`.
    pub async fn remove_by_device(&self, device: &str) {
        let mut tags = self.tags.write().await;
        let before = tags.len();
        tags.retain(|_, t| t.device != device);
        let removed = before - tags.len();
        if removed > 0 {
            tracing::info!(device = %device, removed, "Removed tags for device");
        }
    }

    /// Remove all entries with `last_seen` strictly before `timestamp`.
    /// An entry with `last_seen == timestamp` is retained.
    pub async fn remove_before(&self, timestamp: DateTime<Utc>) {
        let mut tags = self.tags.write().await;
        let before = tags.len();
        tags.retain(|_, t| t.last_seen >= timestamp);
        let removed = before - tags.len();
        if removed > 0 {
            tracing::info!(removed, cutoff = %timestamp, "Removed stale tags");
        }
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.tags.write().await.clear();
    }

    /// Number of live entries.
    pub async fn count(&self) -> usize {
        self.tags.read().await.len()
    }

    /// Snapshot of all live entries.
    pub async fn get_all(&self) -> Vec<TagRecord> {
        self.tags.read().await.values().cloned().collect()
    }

    /// All live EPCs.
    pub async fn get_epcs(&self) -> Vec<String> {
        self.tags
            .read()
            .await
            .values()
            .map(|t| t.epc.clone())
            .collect()
    }

    /// All live TIDs (entries without a TID are skipped).
    pub async fn get_tids(&self) -> Vec<String> {
        self.tags
            .read()
            .await
            .values()
            .filter_map(|t| t.tid.clone())
            .collect()
    }

    /// Entries whose `field` matches `value` (case-insensitive for hex fields).
    pub async fn get_by_identifier(&self, value: &str, field: TagField) -> Vec<TagRecord> {
        let needle = value.trim().to_ascii_uppercase();
        self.tags
            .read()
            .await
            .values()
            .filter(|t| match field {
                TagField::Epc => t.epc == needle,
                TagField::Tid => t.tid.as_deref() == Some(needle.as_str()),
                TagField::Device => t.device.eq_ignore_ascii_case(value.trim()),
                TagField::Antenna => t
                    .antenna
                    .map(|a| a.to_string() == value.trim())
                    .unwrap_or(false),
            })
            .cloned()
            .collect()
    }

    /// Count of live entries per distinct value of `field`.
    /// Entries that lack the field are skipped.
    pub async fn count_distinct_by_field(&self, field: TagField) -> HashMap<String, usize> {
        let tags = self.tags.read().await;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for tag in tags.values() {
            let key = match field {
                TagField::Epc => Some(tag.epc.clone()),
                TagField::Tid => tag.tid.clone(),
                TagField::Device => Some(tag.device.clone()),
                TagField::Antenna => tag.antenna.map(|a| a.to_string()),
            };
            if let Some(key) = key {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }
}
