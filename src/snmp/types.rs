use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnmpError {
    #[error("Timeout")]
    Timeout,
    #[error("Network unreachable")]
    Unreachable,
    #[error("Authentication failure")]
    AuthFailure,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Invalid OID: {0}")]
    InvalidOid(String),
    #[error("SNMP request failed: {0}")]
    RequestFailed(String),
}

pub type SnmpResult<T> = Result<T, SnmpError>;

/// Value carried by one varbind
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Oid(String),
    Counter32(u32),
    Counter64(u64),
    Gauge32(u32),
    TimeTicks(u32),
    IpAddress([u8; 4]),
    Null,
    Unsupported(String),
}

impl SnmpValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter32(v) => Some(*v as i64),
            SnmpValue::Counter64(v) => i64::try_from(*v).ok(),
            SnmpValue::Gauge32(v) => Some(*v as i64),
            SnmpValue::TimeTicks(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnmpValue::Counter64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Counter64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    /// Raw bytes of an OCTET STRING (hardware addresses come back this way)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Best-effort textual rendering for display strings and addresses
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            SnmpValue::IpAddress(ip) => Some(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
            SnmpValue::Oid(oid) => Some(oid.clone()),
            SnmpValue::Null | SnmpValue::Unsupported(_) => None,
            other => other.as_i64().map(|v| v.to_string()),
        }
    }
}

/// Table row index: the OID suffix after a column prefix.
///
/// Ordered component by component, the same order an agent walks its
/// table in, so `10.0.0.2` sorts before `10.0.0.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowIndex(Vec<u32>);

impl RowIndex {
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for RowIndex {
    type Err = SnmpError;

    fn from_str(index: &str) -> SnmpResult<Self> {
        let components = index
            .split('.')
            .map(|part| {
                part.parse::<u32>().map_err(|_| {
                    SnmpError::MalformedResponse(format!("Unparseable row index {}", index))
                })
            })
            .collect::<SnmpResult<Vec<u32>>>()?;
        Ok(Self(components))
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}
