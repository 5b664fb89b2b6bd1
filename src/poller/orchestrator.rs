use crate::correlate::{self, InterfaceSnapshot};
use crate::persistence::{
    DeviceStatus, DeviceStatusUpdate, InterfaceRecord, MetricRecord, Persistence, Reachability,
};
use crate::registry::{DeviceId, SessionRegistry};
use crate::snmp::{oids, DeviceCredentials, SnmpError, SnmpTable, SnmpTransport, VarbindMap};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// System group values. Any of them may be missing on a given agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInfo {
    pub description: Option<String>,
    pub uptime: Option<u32>,
    pub hostname: Option<String>,
}

impl SystemInfo {
    pub fn from_varbinds(values: &VarbindMap) -> Self {
        Self {
            description: values.get(oids::SYS_DESCR).and_then(|v| v.as_text()),
            uptime: values.get(oids::SYS_UPTIME).and_then(|v| v.as_u32()),
            hostname: values
                .get(oids::SYS_NAME)
                .and_then(|v| v.as_text())
                .filter(|name| !name.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceSnapshot {
    pub cpu_utilization: Option<f64>,
    pub memory_used: Option<u64>,
    pub memory_free: Option<u64>,
    pub temperature: Option<f64>,
}

impl PerformanceSnapshot {
    pub fn from_varbinds(values: &VarbindMap) -> Self {
        Self {
            cpu_utilization: values.get(oids::CPU_LOAD).and_then(|v| v.as_f64()),
            memory_used: values.get(oids::MEMORY_USED).and_then(|v| v.as_u64()),
            memory_free: values.get(oids::MEMORY_FREE).and_then(|v| v.as_u64()),
            temperature: values.get(oids::TEMPERATURE).and_then(|v| v.as_f64()),
        }
    }

    /// used / (used + free) * 100, absent unless both are known and non-zero in sum
    pub fn memory_utilization_percent(&self) -> Option<f64> {
        let used = self.memory_used? as f64;
        let total = self.total_memory()? as f64;
        if total == 0.0 {
            return None;
        }
        Some(used / total * 100.0)
    }

    pub fn total_memory(&self) -> Option<u64> {
        self.memory_used?.checked_add(self.memory_free?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The device was unregistered before the cycle started
    Unregistered,
    /// System info could not be read; reachability was downgraded
    Unreachable(SnmpError),
    /// The datastore rejected a write
    PersistenceFailed(String),
    Completed { interfaces: usize },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Runs one poll-and-persist cycle for a device. Holds no state between cycles.
pub struct PollOrchestrator {
    registry: SessionRegistry,
    transport: Arc<dyn SnmpTransport>,
    store: Arc<dyn Persistence>,
}

impl PollOrchestrator {
    pub fn new(
        registry: SessionRegistry,
        transport: Arc<dyn SnmpTransport>,
        store: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            registry,
            transport,
            store,
        }
    }

    pub async fn run_cycle(&self, device_id: &DeviceId) -> CycleOutcome {
        let started_at = Utc::now();

        let device = match self.registry.credentials(device_id) {
            Some(device) => device,
            None => {
                tracing::debug!("Device {} no longer registered, skipping cycle", device_id);
                return CycleOutcome::Unregistered;
            }
        };

        let system = match self.transport.get(&device, &oids::SYSTEM_INFO).await {
            Ok(values) => SystemInfo::from_varbinds(&values),
            Err(e) => {
                tracing::warn!(
                    "System info poll failed for {} at {} ({}): {}",
                    device_id,
                    device.socket_addr(),
                    device.describe(),
                    e
                );
                if let Err(store_err) = self
                    .store
                    .update_device_status(device_id, DeviceStatusUpdate::unreachable())
                    .await
                {
                    tracing::error!(
                        "Failed to store unreachable status for {}: {:#}",
                        device_id,
                        store_err
                    );
                }
                return CycleOutcome::Unreachable(e);
            }
        };

        let performance = match self.transport.get(&device, &oids::PERFORMANCE).await {
            Ok(values) => PerformanceSnapshot::from_varbinds(&values),
            Err(e) => {
                tracing::warn!("Performance poll failed for {}: {}", device_id, e);
                PerformanceSnapshot::default()
            }
        };

        let (interface_table, ip_table, arp_table) = tokio::join!(
            self.fetch_table(&device, "ifTable", &oids::INTERFACE_COLUMNS),
            self.fetch_table(&device, "ipAddrTable", &oids::IP_ADDRESS_COLUMNS),
            self.fetch_table(&device, "ipNetToMediaTable", &oids::ARP_COLUMNS),
        );

        let snapshots = correlate::correlate(
            &correlate::parse_interfaces(&interface_table),
            &correlate::parse_ip_addresses(&ip_table),
            &correlate::parse_arp_entries(&arp_table),
        );

        let interfaces = snapshots.len();
        if let Err(e) = self
            .persist(device_id, started_at, &system, &performance, snapshots)
            .await
        {
            tracing::error!("Failed to store poll results for {}: {:#}", device_id, e);
            return CycleOutcome::PersistenceFailed(format!("{:#}", e));
        }

        tracing::info!(
            "Polled {} ({}): {} interfaces",
            device_id,
            system.hostname.as_deref().unwrap_or("unnamed"),
            interfaces
        );

        CycleOutcome::Completed { interfaces }
    }

    /// Failed table fetches degrade to an empty table
    async fn fetch_table(
        &self,
        device: &DeviceCredentials,
        name: &str,
        columns: &[&str],
    ) -> SnmpTable {
        match self.transport.fetch_table(device, columns).await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch {} for {}: {}",
                    name,
                    device.device_id,
                    e
                );
                SnmpTable::new()
            }
        }
    }

    async fn persist(
        &self,
        device_id: &DeviceId,
        started_at: DateTime<Utc>,
        system: &SystemInfo,
        performance: &PerformanceSnapshot,
        snapshots: Vec<InterfaceSnapshot>,
    ) -> anyhow::Result<()> {
        let memory_percent = performance.memory_utilization_percent();

        self.store
            .update_device_status(
                device_id,
                DeviceStatusUpdate {
                    hostname: system.hostname.clone(),
                    description: system.description.clone(),
                    uptime: system.uptime,
                    status: DeviceStatus::Up,
                    reachability: Reachability::Reachable,
                    cpu_utilization: performance.cpu_utilization,
                    memory_utilization_percent: memory_percent,
                    last_seen: Some(started_at),
                },
            )
            .await?;

        self.store
            .insert_metric(
                device_id,
                MetricRecord {
                    timestamp: started_at,
                    cpu_utilization: performance.cpu_utilization,
                    memory_utilization: memory_percent,
                    temperature: performance.temperature,
                    free_memory: performance.memory_free,
                    total_memory: performance.total_memory(),
                },
            )
            .await?;

        let last_updated = Utc::now();
        for snapshot in snapshots {
            let index = snapshot.index;
            self.store
                .upsert_interface(device_id, index, interface_record(snapshot, last_updated))
                .await?;
        }

        Ok(())
    }
}

fn interface_record(snapshot: InterfaceSnapshot, last_updated: DateTime<Utc>) -> InterfaceRecord {
    if !snapshot.arp_entries.is_empty() {
        tracing::debug!(
            "Interface {} has {} ARP neighbours",
            snapshot.index,
            snapshot.arp_entries.len()
        );
    }

    InterfaceRecord {
        name: snapshot.description,
        if_type: snapshot.if_type,
        mac_address: snapshot.mac.to_string(),
        oper_status: snapshot.oper_status,
        speed: snapshot.speed,
        mtu: snapshot.mtu,
        ip_addresses: snapshot.ip_addresses,
        in_octets: snapshot.counters.in_octets,
        out_octets: snapshot.counters.out_octets,
        in_errors: snapshot.counters.in_errors,
        out_errors: snapshot.counters.out_errors,
        last_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::SnmpValue;

    fn performance(used: Option<u64>, free: Option<u64>) -> PerformanceSnapshot {
        PerformanceSnapshot {
            memory_used: used,
            memory_free: free,
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_percentage() {
        assert_eq!(
            performance(Some(30), Some(70)).memory_utilization_percent(),
            Some(30.0)
        );
        assert_eq!(performance(Some(30), Some(70)).total_memory(), Some(100));
    }

    #[test]
    fn test_memory_percentage_never_divides_by_zero() {
        assert_eq!(performance(Some(0), Some(0)).memory_utilization_percent(), None);
        assert_eq!(performance(Some(0), Some(0)).total_memory(), Some(0));
    }

    #[test]
    fn test_memory_percentage_requires_both_values() {
        assert_eq!(performance(Some(30), None).memory_utilization_percent(), None);
        assert_eq!(performance(None, Some(70)).memory_utilization_percent(), None);
        assert_eq!(performance(None, Some(70)).total_memory(), None);
    }

    #[test]
    fn test_system_info_from_varbinds() {
        let mut values = VarbindMap::new();
        values.insert(
            oids::SYS_DESCR.to_string(),
            SnmpValue::OctetString(b"Cisco IOS Software".to_vec()),
        );
        values.insert(oids::SYS_UPTIME.to_string(), SnmpValue::TimeTicks(8_640_000));
        values.insert(oids::SYS_NAME.to_string(), SnmpValue::OctetString(Vec::new()));

        let info = SystemInfo::from_varbinds(&values);
        assert_eq!(info.description.as_deref(), Some("Cisco IOS Software"));
        assert_eq!(info.uptime, Some(8_640_000));
        assert_eq!(info.hostname, None);
    }

    #[test]
    fn test_performance_from_varbinds() {
        let mut values = VarbindMap::new();
        values.insert(oids::CPU_LOAD.to_string(), SnmpValue::Gauge32(17));
        values.insert(oids::MEMORY_USED.to_string(), SnmpValue::Gauge32(256));
        values.insert(oids::TEMPERATURE.to_string(), SnmpValue::Integer(41));

        let perf = PerformanceSnapshot::from_varbinds(&values);
        assert_eq!(perf.cpu_utilization, Some(17.0));
        assert_eq!(perf.memory_used, Some(256));
        assert_eq!(perf.memory_free, None);
        assert_eq!(perf.temperature, Some(41.0));
        assert_eq!(perf.memory_utilization_percent(), None);
    }
}
