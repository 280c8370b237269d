//! Deployment registry
//!
//! Maps deployment names to the image index they were built under. The host
//! port of a deployment is always `base_port + index`.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Registry entry for one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEntry {
    pub name: String,
    pub index: u32,
    pub host_port: u16,
    pub image: String,
    pub branch: String,
    pub container_port: u16,
    pub deployed_at: DateTime<Utc>,
}

/// In-memory deployment registry
pub struct DeploymentRegistry {
    entries: RwLock<HashMap<String, DeploymentEntry>>,
    base_port: u16,
}

impl DeploymentRegistry {
    /// Create an empty registry
    pub fn new(base_port: u16) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            base_port,
        }
    }

    /// Host port for an image index, if it fits in the port range
    pub fn port_for(&self, index: u32) -> Option<u16> {
        u16::try_from(u32::from(self.base_port) + index).ok()
    }

    /// Insert or overwrite a deployment. Returns the entry it replaced.
    ///
    /// Replacing an entry only reroutes traffic; the container behind the old
    /// entry keeps running.
    pub fn register(&self, entry: DeploymentEntry) -> Option<DeploymentEntry> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.name.clone(), entry)
    }

    /// Image index of a deployment
    pub fn lookup(&self, name: &str) -> Option<u32> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).map(|e| e.index)
    }

    /// Snapshot of all entries, sorted by name
    pub fn list(&self) -> Vec<DeploymentEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<DeploymentEntry> = entries.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
