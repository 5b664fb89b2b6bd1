//! Merges the raw ifTable, ipAddrTable and ARP table of one device into a
//! per-interface view. Pure functions, no I/O.

use crate::snmp::{RowIndex, SnmpTable, SnmpValue};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Hardware address as reported by the agent. Zero-length for interfaces
/// without one (loopback, tunnels).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(Vec<u8>);

impl MacAddress {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperStatus {
    Up,
    Down,
}

impl OperStatus {
    /// ifOperStatus code 1 is up; testing, dormant, notPresent etc. count as down
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            Self::Up
        } else {
            Self::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub in_octets: Option<u64>,
    pub out_octets: Option<u64>,
    pub in_errors: Option<u64>,
    pub out_errors: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawInterface {
    pub index: u32,
    pub description: Option<String>,
    pub mac: MacAddress,
    pub if_type: Option<i64>,
    pub oper_status: OperStatus,
    pub speed: Option<u64>,
    pub mtu: Option<i64>,
    pub counters: InterfaceCounters,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawIpAddress {
    pub address: String,
    pub if_index: u32,
    pub subnet_mask: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArpEntry {
    pub mac: MacAddress,
    pub ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpBinding {
    pub address: String,
    pub subnet_mask: Option<String>,
}

/// Correlated view of one interface for a single poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceSnapshot {
    pub index: u32,
    pub description: Option<String>,
    pub mac: MacAddress,
    pub if_type: Option<i64>,
    pub oper_status: OperStatus,
    pub speed: Option<u64>,
    pub mtu: Option<i64>,
    pub counters: InterfaceCounters,
    pub ip_addresses: Vec<IpBinding>,
    pub arp_entries: Vec<ArpEntry>,
}

/// Build interface snapshots ordered by interface index.
///
/// An ARP entry is attached to every interface whose hardware address or
/// own IP addresses match it, so the same entry can show up under more than
/// one interface.
pub fn correlate(
    interfaces: &[RawInterface],
    ip_addresses: &[RawIpAddress],
    arp_entries: &[ArpEntry],
) -> Vec<InterfaceSnapshot> {
    let mut snapshots: Vec<InterfaceSnapshot> = interfaces
        .iter()
        .map(|iface| {
            let ip_addresses: Vec<IpBinding> = ip_addresses
                .iter()
                .filter(|ip| ip.if_index == iface.index)
                .map(|ip| IpBinding {
                    address: ip.address.clone(),
                    subnet_mask: ip.subnet_mask.clone(),
                })
                .collect();

            let arp_entries = arp_entries
                .iter()
                .filter(|arp| {
                    (!iface.mac.is_empty() && arp.mac == iface.mac)
                        || ip_addresses.iter().any(|ip| ip.address == arp.ip_address)
                })
                .cloned()
                .collect();

            InterfaceSnapshot {
                index: iface.index,
                description: iface.description.clone(),
                mac: iface.mac.clone(),
                if_type: iface.if_type,
                oper_status: iface.oper_status,
                speed: iface.speed,
                mtu: iface.mtu,
                counters: iface.counters,
                ip_addresses,
                arp_entries,
            }
        })
        .collect();

    snapshots.sort_by_key(|snapshot| snapshot.index);
    snapshots
}

/// Parse ifTable rows fetched with `oids::INTERFACE_COLUMNS`
pub fn parse_interfaces(table: &SnmpTable) -> Vec<RawInterface> {
    let mut interfaces: Vec<RawInterface> = table
        .iter()
        .filter_map(|(index, row)| {
            let index = match index.components() {
                [index] => *index,
                _ => {
                    tracing::debug!("Skipping ifTable row with index {}", index);
                    return None;
                }
            };

            Some(RawInterface {
                index,
                description: column(row, 0).and_then(SnmpValue::as_text),
                mac: column(row, 1)
                    .and_then(SnmpValue::as_bytes)
                    .map(MacAddress::from_bytes)
                    .unwrap_or_default(),
                if_type: column(row, 2).and_then(SnmpValue::as_i64),
                oper_status: OperStatus::from_code(
                    column(row, 3).and_then(SnmpValue::as_i64).unwrap_or(0),
                ),
                speed: column(row, 4).and_then(SnmpValue::as_u64),
                mtu: column(row, 5).and_then(SnmpValue::as_i64),
                counters: InterfaceCounters {
                    in_octets: column(row, 6).and_then(SnmpValue::as_u64),
                    out_octets: column(row, 7).and_then(SnmpValue::as_u64),
                    in_errors: column(row, 8).and_then(SnmpValue::as_u64),
                    out_errors: column(row, 9).and_then(SnmpValue::as_u64),
                },
            })
        })
        .collect();

    interfaces.sort_by_key(|iface| iface.index);
    interfaces
}

/// Parse ipAddrTable rows fetched with `oids::IP_ADDRESS_COLUMNS`, in OID order.
/// The row index is the address itself, used when the address column is missing.
pub fn parse_ip_addresses(table: &SnmpTable) -> Vec<RawIpAddress> {
    table
        .iter()
        .filter_map(|(index, row)| {
            let if_index = column(row, 1).and_then(SnmpValue::as_u32);
            let if_index = match if_index {
                Some(if_index) => if_index,
                None => {
                    tracing::debug!("Skipping ipAddrTable row {} without ifIndex", index);
                    return None;
                }
            };

            let address = column(row, 0)
                .and_then(SnmpValue::as_text)
                .unwrap_or_else(|| index.to_string());

            Some(RawIpAddress {
                address,
                if_index,
                subnet_mask: column(row, 2).and_then(SnmpValue::as_text),
            })
        })
        .collect()
}

/// Parse ipNetToMediaTable rows fetched with `oids::ARP_COLUMNS`.
/// Row indices are `ifIndex.a.b.c.d`.
pub fn parse_arp_entries(table: &SnmpTable) -> Vec<ArpEntry> {
    table
        .iter()
        .filter_map(|(index, row)| {
            let ip_address = column(row, 1)
                .and_then(SnmpValue::as_text)
                .or_else(|| address_from_arp_index(index));
            let ip_address = match ip_address {
                Some(ip_address) => ip_address,
                None => {
                    tracing::debug!("Skipping ARP row {} without an address", index);
                    return None;
                }
            };

            Some(ArpEntry {
                mac: column(row, 0)
                    .and_then(SnmpValue::as_bytes)
                    .map(MacAddress::from_bytes)
                    .unwrap_or_default(),
                ip_address,
            })
        })
        .collect()
}

fn column(row: &[Option<SnmpValue>], position: usize) -> Option<&SnmpValue> {
    row.get(position).and_then(Option::as_ref)
}

fn address_from_arp_index(index: &RowIndex) -> Option<String> {
    match index.components() {
        [_, a, b, c, d] => Some(format!("{}.{}.{}.{}", a, b, c, d)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC_A: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
    const MAC_B: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn interface(index: u32, mac: &[u8]) -> RawInterface {
        RawInterface {
            index,
            description: Some(format!("eth{}", index)),
            mac: MacAddress::from_bytes(mac),
            if_type: Some(6),
            oper_status: OperStatus::Up,
            speed: Some(1_000_000_000),
            mtu: Some(1500),
            counters: InterfaceCounters::default(),
        }
    }

    fn ip(address: &str, if_index: u32, mask: &str) -> RawIpAddress {
        RawIpAddress {
            address: address.to_string(),
            if_index,
            subnet_mask: Some(mask.to_string()),
        }
    }

    fn arp(mac: &[u8], ip_address: &str) -> ArpEntry {
        ArpEntry {
            mac: MacAddress::from_bytes(mac),
            ip_address: ip_address.to_string(),
        }
    }

    fn row(index: &str) -> RowIndex {
        index.parse().unwrap()
    }

    #[test]
    fn test_mac_address_display() {
        assert_eq!(MacAddress::from_bytes(&MAC_A).to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(MacAddress::default().to_string(), "");
    }

    #[test]
    fn test_oper_status_mapping() {
        assert_eq!(OperStatus::from_code(1), OperStatus::Up);
        assert_eq!(OperStatus::from_code(2), OperStatus::Down);
        assert_eq!(OperStatus::from_code(0), OperStatus::Down);
        assert_eq!(OperStatus::from_code(7), OperStatus::Down);
        assert_eq!(OperStatus::Up.as_str(), "up");
        assert_eq!(OperStatus::Down.as_str(), "down");
    }

    #[test]
    fn test_single_interface_correlation() {
        let snapshots = correlate(
            &[interface(1, &MAC_A)],
            &[ip("10.0.0.1", 1, "255.255.255.0")],
            &[arp(&MAC_A, "10.0.0.1")],
        );

        assert_eq!(snapshots.len(), 1);
        let eth1 = &snapshots[0];
        assert_eq!(eth1.index, 1);
        assert_eq!(
            eth1.ip_addresses,
            vec![IpBinding {
                address: "10.0.0.1".to_string(),
                subnet_mask: Some("255.255.255.0".to_string()),
            }]
        );
        assert_eq!(eth1.arp_entries, vec![arp(&MAC_A, "10.0.0.1")]);
    }

    #[test]
    fn test_ip_addresses_keep_table_order() {
        let snapshots = correlate(
            &[interface(3, &MAC_A)],
            &[
                ip("192.0.2.1", 3, "255.255.255.0"),
                ip("198.51.100.1", 4, "255.255.255.0"),
                ip("203.0.113.1", 3, "255.255.255.252"),
            ],
            &[],
        );

        let addresses: Vec<&str> = snapshots[0]
            .ip_addresses
            .iter()
            .map(|binding| binding.address.as_str())
            .collect();
        assert_eq!(addresses, vec!["192.0.2.1", "203.0.113.1"]);
    }

    #[test]
    fn test_arp_entry_may_match_two_interfaces() {
        // MAC belongs to eth1, IP belongs to eth2
        let snapshots = correlate(
            &[interface(1, &MAC_A), interface(2, &MAC_B)],
            &[ip("10.0.0.2", 2, "255.255.255.0")],
            &[arp(&MAC_A, "10.0.0.2")],
        );

        assert_eq!(snapshots[0].arp_entries.len(), 1);
        assert_eq!(snapshots[1].arp_entries.len(), 1);
    }

    #[test]
    fn test_empty_mac_does_not_match_by_hardware_address() {
        let snapshots = correlate(&[interface(1, &[])], &[], &[arp(&[], "10.0.0.9")]);
        assert!(snapshots[0].arp_entries.is_empty());
    }

    #[test]
    fn test_snapshots_sorted_by_index() {
        let snapshots = correlate(&[interface(10, &MAC_A), interface(2, &MAC_B)], &[], &[]);
        let indices: Vec<u32> = snapshots.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 10]);
    }

    #[test]
    fn test_parse_interfaces() {
        let mut table = SnmpTable::new();
        table.insert(
            row("2"),
            vec![
                Some(SnmpValue::OctetString(b"GigabitEthernet0/1".to_vec())),
                Some(SnmpValue::OctetString(MAC_A.to_vec())),
                Some(SnmpValue::Integer(6)),
                Some(SnmpValue::Integer(2)),
                Some(SnmpValue::Gauge32(1_000_000_000)),
                Some(SnmpValue::Integer(1500)),
                Some(SnmpValue::Counter32(1234)),
                Some(SnmpValue::Counter32(5678)),
                Some(SnmpValue::Counter32(1)),
                None,
            ],
        );
        table.insert(row("1.2"), vec![None; 10]);
        table.insert(row("1"), vec![None; 10]);

        let interfaces = parse_interfaces(&table);
        assert_eq!(interfaces.len(), 2);

        let lo = &interfaces[0];
        assert_eq!(lo.index, 1);
        assert!(lo.mac.is_empty());
        assert_eq!(lo.oper_status, OperStatus::Down);

        let gi = &interfaces[1];
        assert_eq!(gi.description.as_deref(), Some("GigabitEthernet0/1"));
        assert_eq!(gi.mac.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(gi.oper_status, OperStatus::Down);
        assert_eq!(gi.speed, Some(1_000_000_000));
        assert_eq!(gi.mtu, Some(1500));
        assert_eq!(gi.counters.in_octets, Some(1234));
        assert_eq!(gi.counters.out_errors, None);
    }

    #[test]
    fn test_parse_ip_addresses_falls_back_to_row_index() {
        let mut table = SnmpTable::new();
        table.insert(
            row("10.0.0.1"),
            vec![
                None,
                Some(SnmpValue::Integer(1)),
                Some(SnmpValue::IpAddress([255, 255, 255, 0])),
            ],
        );
        table.insert(
            row("10.0.0.2"),
            vec![Some(SnmpValue::IpAddress([10, 0, 0, 2])), None, None],
        );

        let addresses = parse_ip_addresses(&table);
        assert_eq!(addresses, vec![ip("10.0.0.1", 1, "255.255.255.0")]);
    }

    #[test]
    fn test_parse_arp_entries() {
        let mut table = SnmpTable::new();
        table.insert(
            row("1.10.0.0.9"),
            vec![Some(SnmpValue::OctetString(MAC_B.to_vec())), None],
        );
        table.insert(
            row("1.10.0.0.10"),
            vec![
                Some(SnmpValue::OctetString(MAC_A.to_vec())),
                Some(SnmpValue::IpAddress([10, 0, 0, 10])),
            ],
        );
        table.insert(row("7"), vec![None, None]);

        let entries = parse_arp_entries(&table);
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&arp(&MAC_B, "10.0.0.9")));
        assert!(entries.contains(&arp(&MAC_A, "10.0.0.10")));
    }

    #[test]
    fn test_addresses_keep_oid_order() {
        let mut table = SnmpTable::new();
        for last in [10u8, 2] {
            table.insert(
                row(&format!("10.0.0.{}", last)),
                vec![
                    Some(SnmpValue::IpAddress([10, 0, 0, last])),
                    Some(SnmpValue::Integer(1)),
                    Some(SnmpValue::IpAddress([255, 255, 255, 0])),
                ],
            );
        }

        let addresses = parse_ip_addresses(&table);
        let snapshots = correlate(&[interface(1, &MAC_A)], &addresses, &[]);

        let bound: Vec<&str> = snapshots[0]
            .ip_addresses
            .iter()
            .map(|binding| binding.address.as_str())
            .collect();
        assert_eq!(bound, vec!["10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn test_arp_entries_keep_oid_order() {
        let mut table = SnmpTable::new();
        table.insert(row("2.10.0.0.1"), vec![None, None]);
        table.insert(row("10.10.0.0.1"), vec![None, None]);
        table.insert(row("2.10.0.0.20"), vec![None, None]);
        table.insert(row("2.10.0.0.3"), vec![None, None]);

        let addresses: Vec<String> = parse_arp_entries(&table)
            .into_iter()
            .map(|entry| entry.ip_address)
            .collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.3", "10.0.0.20", "10.0.0.1"]);
    }
}
