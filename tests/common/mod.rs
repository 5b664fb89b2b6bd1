//! Scripted SNMP agent shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use snmp_monitor::snmp::{
    oids, DeviceCredentials, RowIndex, SnmpError, SnmpResult, SnmpTable, SnmpTransport,
    SnmpValue, VarbindMap,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const MAC: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];

/// Answers like a small switch with one interface, one address and one
/// ARP neighbour. System GETs can be delayed or made to time out.
#[derive(Default)]
pub struct FakeAgent {
    unreachable: AtomicBool,
    system_delay: Mutex<Duration>,
    system_gets: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_system_delay(&self, delay: Duration) {
        *self.system_delay.lock().unwrap() = delay;
    }

    /// Number of cycles that reached the system-info step
    pub fn system_gets(&self) -> usize {
        self.system_gets.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn system_info(&self) -> SnmpResult<VarbindMap> {
        self.system_gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.system_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SnmpError::Timeout);
        }

        let mut values = VarbindMap::new();
        values.insert(oids::SYS_DESCR.to_string(), text("Test switch"));
        values.insert(oids::SYS_UPTIME.to_string(), SnmpValue::TimeTicks(123_456));
        values.insert(oids::SYS_NAME.to_string(), text("sw-test"));
        Ok(values)
    }

    fn performance(&self) -> VarbindMap {
        let mut values = VarbindMap::new();
        values.insert(oids::CPU_LOAD.to_string(), SnmpValue::Gauge32(12));
        values.insert(oids::MEMORY_USED.to_string(), SnmpValue::Gauge32(30));
        values.insert(oids::MEMORY_FREE.to_string(), SnmpValue::Gauge32(70));
        values
    }
}

pub fn text(value: &str) -> SnmpValue {
    SnmpValue::OctetString(value.as_bytes().to_vec())
}

pub fn row(index: &str) -> RowIndex {
    index.parse().expect("row index")
}

pub fn interface_table() -> SnmpTable {
    let mut table = SnmpTable::new();
    table.insert(
        row("1"),
        vec![
            Some(text("GigabitEthernet0/1")),
            Some(SnmpValue::OctetString(MAC.to_vec())),
            Some(SnmpValue::Integer(6)),
            Some(SnmpValue::Integer(1)),
            Some(SnmpValue::Gauge32(1_000_000_000)),
            Some(SnmpValue::Integer(1500)),
            Some(SnmpValue::Counter32(1000)),
            Some(SnmpValue::Counter32(2000)),
            Some(SnmpValue::Counter32(0)),
            Some(SnmpValue::Counter32(3)),
        ],
    );
    table
}

pub fn ip_address_table() -> SnmpTable {
    let mut table = SnmpTable::new();
    table.insert(
        row("10.0.0.1"),
        vec![
            Some(SnmpValue::IpAddress([10, 0, 0, 1])),
            Some(SnmpValue::Integer(1)),
            Some(SnmpValue::IpAddress([255, 255, 255, 0])),
        ],
    );
    table
}

pub fn arp_table() -> SnmpTable {
    let mut table = SnmpTable::new();
    table.insert(
        row("1.10.0.0.1"),
        vec![
            Some(SnmpValue::OctetString(MAC.to_vec())),
            Some(SnmpValue::IpAddress([10, 0, 0, 1])),
        ],
    );
    table
}

#[async_trait]
impl SnmpTransport for FakeAgent {
    async fn get(&self, _device: &DeviceCredentials, requested: &[&str]) -> SnmpResult<VarbindMap> {
        if requested.first() == Some(&oids::SYS_DESCR) {
            self.system_info().await
        } else {
            Ok(self.performance())
        }
    }

    async fn fetch_table(
        &self,
        _device: &DeviceCredentials,
        columns: &[&str],
    ) -> SnmpResult<SnmpTable> {
        match columns.first().copied() {
            Some(column) if column == oids::INTERFACE_COLUMNS[0] => Ok(interface_table()),
            Some(column) if column == oids::IP_ADDRESS_COLUMNS[0] => Ok(ip_address_table()),
            Some(column) if column == oids::ARP_COLUMNS[0] => Ok(arp_table()),
            _ => Err(SnmpError::MalformedResponse("unexpected table".to_string())),
        }
    }
}

pub fn switch(id: &str) -> DeviceCredentials {
    DeviceCredentials::community(id, "192.0.2.10", "public")
}
