use super::types::{SnmpError, SnmpResult};
use crate::registry::DeviceId;
use crate::secret::SecretString;
use std::str::FromStr;

pub const DEFAULT_SNMP_PORT: u16 = 161;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl FromStr for SnmpVersion {
    type Err = SnmpError;

    fn from_str(tag: &str) -> SnmpResult<Self> {
        match tag.trim().to_lowercase().as_str() {
            "1" | "v1" | "snmpv1" => Ok(Self::V1),
            "2c" | "v2c" | "snmpv2c" | "2" | "v2" => Ok(Self::V2c),
            "3" | "v3" | "snmpv3" => Ok(Self::V3),
            _ => Err(SnmpError::RequestFailed(format!(
                "Unsupported SNMP version: '{}'. Supported versions: 1, v1, 2c, v2c, 3, v3",
                tag
            ))),
        }
    }
}

impl std::fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2c => write!(f, "v2c"),
            Self::V3 => write!(f, "v3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl FromStr for AuthProtocol {
    type Err = SnmpError;

    fn from_str(protocol: &str) -> SnmpResult<Self> {
        match protocol.trim().to_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA224" | "SHA-224" => Ok(Self::Sha224),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(SnmpError::RequestFailed(format!(
                "Unsupported auth protocol: '{}'",
                protocol
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl FromStr for PrivProtocol {
    type Err = SnmpError;

    fn from_str(protocol: &str) -> SnmpResult<Self> {
        match protocol.trim().to_uppercase().as_str() {
            "DES" => Ok(Self::Des),
            "AES" | "AES128" | "AES-128" => Ok(Self::Aes128),
            "AES192" | "AES-192" => Ok(Self::Aes192),
            "AES256" | "AES-256" | "AES-256-C" => Ok(Self::Aes256),
            _ => Err(SnmpError::RequestFailed(format!(
                "Unsupported priv protocol: '{}'",
                protocol
            ))),
        }
    }
}

/// SNMPv3 user-based security model credentials.
///
/// The security level follows from which keys are present: no auth key is
/// noAuthNoPriv, an auth key alone is authNoPriv, both keys is authPriv.
#[derive(Debug, Clone)]
pub struct UsmCredentials {
    pub username: String,
    pub auth: Option<(AuthProtocol, SecretString)>,
    pub privacy: Option<(PrivProtocol, SecretString)>,
}

impl UsmCredentials {
    pub fn security_level(&self) -> &'static str {
        match (&self.auth, &self.privacy) {
            (None, _) => "noAuthNoPriv",
            (Some(_), None) => "authNoPriv",
            (Some(_), Some(_)) => "authPriv",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Credentials {
    Community(SecretString),
    Usm(UsmCredentials),
}

/// Everything needed to reach one device. Immutable for a poll cycle.
#[derive(Debug, Clone)]
pub struct DeviceCredentials {
    pub device_id: DeviceId,
    pub address: String,
    pub port: u16,
    pub version: SnmpVersion,
    pub credentials: Credentials,
}

impl DeviceCredentials {
    pub fn community(
        device_id: impl Into<DeviceId>,
        address: impl Into<String>,
        community: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            port: DEFAULT_SNMP_PORT,
            version: SnmpVersion::V2c,
            credentials: Credentials::Community(SecretString::new(community)),
        }
    }

    pub fn usm(
        device_id: impl Into<DeviceId>,
        address: impl Into<String>,
        usm: UsmCredentials,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            port: DEFAULT_SNMP_PORT,
            version: SnmpVersion::V3,
            credentials: Credentials::Usm(usm),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// Log-safe description of the credential in use
    pub fn describe(&self) -> String {
        match &self.credentials {
            Credentials::Community(community) => {
                format!("{} community {}", self.version, community.hint())
            }
            Credentials::Usm(usm) => {
                format!("{} user {} ({})", self.version, usm.username, usm.security_level())
            }
        }
    }
}
