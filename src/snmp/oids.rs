//! Object identifiers polled on every cycle.
//!
//! System group and the interface/address tables come from SNMPv2-MIB,
//! IF-MIB and IP-MIB. The performance counters are the Cisco
//! CISCO-PROCESS-MIB / CISCO-MEMORY-POOL-MIB / CISCO-ENVMON-MIB instances
//! most devices in the fleet expose.

pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_UPTIME: &str = "1.3.6.1.2.1.1.3.0";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";

pub const CPU_LOAD: &str = "1.3.6.1.4.1.9.9.109.1.1.1.1.5.1";
pub const MEMORY_USED: &str = "1.3.6.1.4.1.9.9.48.1.1.1.5.1";
pub const MEMORY_FREE: &str = "1.3.6.1.4.1.9.9.48.1.1.1.6.1";
pub const TEMPERATURE: &str = "1.3.6.1.4.1.9.9.13.1.3.1.3.1";

// ifTable (1.3.6.1.2.1.2.2) entry columns
pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_TYPE: &str = "1.3.6.1.2.1.2.2.1.3";
pub const IF_MTU: &str = "1.3.6.1.2.1.2.2.1.4";
pub const IF_SPEED: &str = "1.3.6.1.2.1.2.2.1.5";
pub const IF_PHYS_ADDRESS: &str = "1.3.6.1.2.1.2.2.1.6";
pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";
pub const IF_IN_OCTETS: &str = "1.3.6.1.2.1.2.2.1.10";
pub const IF_IN_ERRORS: &str = "1.3.6.1.2.1.2.2.1.14";
pub const IF_OUT_OCTETS: &str = "1.3.6.1.2.1.2.2.1.16";
pub const IF_OUT_ERRORS: &str = "1.3.6.1.2.1.2.2.1.20";

// ipAddrTable (1.3.6.1.2.1.4.20) entry columns
pub const IP_AD_ENT_ADDR: &str = "1.3.6.1.2.1.4.20.1.1";
pub const IP_AD_ENT_IF_INDEX: &str = "1.3.6.1.2.1.4.20.1.2";
pub const IP_AD_ENT_NET_MASK: &str = "1.3.6.1.2.1.4.20.1.3";

// ipNetToMediaTable (1.3.6.1.2.1.4.22) entry columns
pub const IP_NET_TO_MEDIA_PHYS_ADDRESS: &str = "1.3.6.1.2.1.4.22.1.2";
pub const IP_NET_TO_MEDIA_NET_ADDRESS: &str = "1.3.6.1.2.1.4.22.1.3";

pub const SYSTEM_INFO: [&str; 3] = [SYS_DESCR, SYS_UPTIME, SYS_NAME];

pub const PERFORMANCE: [&str; 4] = [CPU_LOAD, MEMORY_USED, MEMORY_FREE, TEMPERATURE];

/// Column order shared with `correlate::parse_interfaces`
pub const INTERFACE_COLUMNS: [&str; 10] = [
    IF_DESCR,
    IF_PHYS_ADDRESS,
    IF_TYPE,
    IF_OPER_STATUS,
    IF_SPEED,
    IF_MTU,
    IF_IN_OCTETS,
    IF_OUT_OCTETS,
    IF_IN_ERRORS,
    IF_OUT_ERRORS,
];

/// Column order shared with `correlate::parse_ip_addresses`
pub const IP_ADDRESS_COLUMNS: [&str; 3] = [IP_AD_ENT_ADDR, IP_AD_ENT_IF_INDEX, IP_AD_ENT_NET_MASK];

/// Column order shared with `correlate::parse_arp_entries`
pub const ARP_COLUMNS: [&str; 2] = [IP_NET_TO_MEDIA_PHYS_ADDRESS, IP_NET_TO_MEDIA_NET_ADDRESS];
