mod client;
pub mod credentials;
pub mod oids;
mod types;

pub use client::{
    ClientOptions, SnmpClient, SnmpTable, SnmpTransport, VarbindMap, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT,
};
pub use credentials::{
    AuthProtocol, Credentials, DeviceCredentials, PrivProtocol, SnmpVersion, UsmCredentials,
};
pub use types::{RowIndex, SnmpError, SnmpResult, SnmpValue};
