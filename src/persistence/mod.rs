//! Datastore seam consumed by the poll orchestrator.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, StoreEvent};
pub use sqlite::{SqliteStore, StoredStatus};

use crate::correlate::{IpBinding, OperStatus};
use crate::registry::DeviceId;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Administrative status written by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Up,
    Down,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Whether the most recent cycle could talk to the device at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Reachable,
    Unreachable,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
        }
    }
}

/// Absent fields leave the stored value untouched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatusUpdate {
    pub hostname: Option<String>,
    pub description: Option<String>,
    /// sysUpTime in hundredths of a second
    pub uptime: Option<u32>,
    pub status: DeviceStatus,
    pub reachability: Reachability,
    pub cpu_utilization: Option<f64>,
    pub memory_utilization_percent: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceStatusUpdate {
    pub fn unreachable() -> Self {
        Self {
            hostname: None,
            description: None,
            uptime: None,
            status: DeviceStatus::Down,
            reachability: Reachability::Unreachable,
            cpu_utilization: None,
            memory_utilization_percent: None,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    pub temperature: Option<f64>,
    pub free_memory: Option<u64>,
    pub total_memory: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceRecord {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub if_type: Option<i64>,
    pub mac_address: String,
    pub oper_status: OperStatus,
    pub speed: Option<u64>,
    pub mtu: Option<i64>,
    pub ip_addresses: Vec<IpBinding>,
    pub in_octets: Option<u64>,
    pub out_octets: Option<u64>,
    pub in_errors: Option<u64>,
    pub out_errors: Option<u64>,
    pub last_updated: DateTime<Utc>,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn update_device_status(
        &self,
        device_id: &DeviceId,
        update: DeviceStatusUpdate,
    ) -> Result<()>;

    async fn insert_metric(&self, device_id: &DeviceId, metric: MetricRecord) -> Result<()>;

    /// Insert or replace the record keyed by (device, interface index)
    async fn upsert_interface(
        &self,
        device_id: &DeviceId,
        interface_index: u32,
        record: InterfaceRecord,
    ) -> Result<()>;
}
