//! SNMP device polling and correlation engine.
//!
//! Each monitored device gets its own repeating poll task. A cycle reads the
//! system group and performance counters, walks the interface, IP address and
//! ARP tables, correlates them per interface and writes the result through a
//! [`persistence::Persistence`] adapter.

pub mod config;
pub mod correlate;
pub mod monitor;
pub mod persistence;
pub mod poller;
pub mod registry;
pub mod secret;
pub mod snmp;

pub use monitor::DeviceMonitor;
pub use registry::DeviceId;
