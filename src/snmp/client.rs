use super::credentials::{
    AuthProtocol, Credentials, DeviceCredentials, PrivProtocol, SnmpVersion, UsmCredentials,
};
use super::types::{RowIndex, SnmpError, SnmpResult, SnmpValue};
use async_trait::async_trait;
use snmp2::{Oid, SyncSession};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 1;

/// Upper bound on rows returned by a single column walk
const MAX_WALK_ROWS: usize = 100_000;

/// Per-exchange timeout and retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Requested OID → value. OIDs the agent does not implement are absent.
pub type VarbindMap = HashMap<String, SnmpValue>;

/// Row index (OID suffix after the column) → one value per requested column.
/// Iterates in OID order.
pub type SnmpTable = BTreeMap<RowIndex, Vec<Option<SnmpValue>>>;

/// A single request/response exchange against one device.
/// Implementations hold no state across calls.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    async fn get(&self, device: &DeviceCredentials, oids: &[&str]) -> SnmpResult<VarbindMap>;

    async fn fetch_table(
        &self,
        device: &DeviceCredentials,
        columns: &[&str],
    ) -> SnmpResult<SnmpTable>;
}

/// `snmp2` backed client. Each call opens its own session on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnmpClient {
    options: ClientOptions,
}

impl SnmpClient {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }
}

#[async_trait]
impl SnmpTransport for SnmpClient {
    async fn get(&self, device: &DeviceCredentials, oids: &[&str]) -> SnmpResult<VarbindMap> {
        let device = device.clone();
        let oids: Vec<String> = oids.iter().map(|oid| oid.to_string()).collect();
        let options = self.options;

        tokio::task::spawn_blocking(move || blocking_get(&device, options, &oids))
            .await
            .map_err(|e| SnmpError::RequestFailed(format!("Task join error: {}", e)))?
    }

    async fn fetch_table(
        &self,
        device: &DeviceCredentials,
        columns: &[&str],
    ) -> SnmpResult<SnmpTable> {
        let device = device.clone();
        let columns: Vec<String> = columns.iter().map(|oid| oid.to_string()).collect();
        let options = self.options;

        tokio::task::spawn_blocking(move || blocking_fetch_table(&device, options, &columns))
            .await
            .map_err(|e| SnmpError::RequestFailed(format!("Task join error: {}", e)))?
    }
}

fn blocking_get(
    device: &DeviceCredentials,
    options: ClientOptions,
    oids: &[String],
) -> SnmpResult<VarbindMap> {
    let mut session = open_session(device, options)?;
    let mut values = HashMap::with_capacity(oids.len());

    for oid in oids {
        let parsed = parse_oid(oid)?;
        let value = with_retries(options.retries, || {
            session.get(&parsed).map(|mut response| {
                // v1 agents answer noSuchName through error_status
                if response.error_status != 0 {
                    return None;
                }
                response
                    .varbinds
                    .next()
                    .and_then(|(_, value)| convert_value(value))
            })
        })?;

        if let Some(value) = value {
            values.insert(oid.clone(), value);
        }
    }

    Ok(values)
}

fn blocking_fetch_table(
    device: &DeviceCredentials,
    options: ClientOptions,
    columns: &[String],
) -> SnmpResult<SnmpTable> {
    let mut session = open_session(device, options)?;
    let mut table = SnmpTable::new();

    for (position, column) in columns.iter().enumerate() {
        for (index, value) in walk_column(&mut session, column, options.retries)? {
            table
                .entry(index)
                .or_insert_with(|| vec![None; columns.len()])[position] = Some(value);
        }
    }

    tracing::debug!(
        "Fetched {} rows across {} columns from {}",
        table.len(),
        columns.len(),
        device.device_id
    );

    Ok(table)
}

/// GETNEXT through one column until the agent leaves its subtree.
/// Returns (row index, value) pairs in agent order.
fn walk_column(
    session: &mut SyncSession,
    column: &str,
    retries: u32,
) -> SnmpResult<Vec<(RowIndex, SnmpValue)>> {
    let prefix = format!("{}.", column);
    let mut current = column.to_string();
    let mut rows = Vec::new();

    loop {
        let oid = parse_oid(&current)?;
        let next = with_retries(retries, || {
            session.getnext(&oid).map(|mut response| {
                if response.error_status != 0 {
                    return None;
                }
                response
                    .varbinds
                    .next()
                    .map(|(name, value)| (name.to_string(), convert_value(value)))
            })
        })?;

        let (name, value) = match next {
            Some((name, Some(value))) => (name, value),
            // end of view, exception value or error status
            _ => break,
        };

        let index: RowIndex = match name.strip_prefix(&prefix) {
            Some(index) if !index.is_empty() => index.parse()?,
            _ => break,
        };

        if oid_components(&name)? <= oid_components(&current)? {
            return Err(SnmpError::MalformedResponse(format!(
                "OID {} does not increase after {}",
                name, current
            )));
        }

        rows.push((index, value));
        if rows.len() > MAX_WALK_ROWS {
            return Err(SnmpError::MalformedResponse(format!(
                "Column {} exceeded {} rows",
                column, MAX_WALK_ROWS
            )));
        }

        current = name;
    }

    Ok(rows)
}

/// Run one exchange, retrying `retries` times on timeout and once more
/// after SNMPv3 engine-id discovery.
fn with_retries<T>(
    retries: u32,
    mut exchange: impl FnMut() -> Result<T, snmp2::Error>,
) -> SnmpResult<T> {
    let mut attempts = 0;
    let mut engine_discovered = false;

    loop {
        match exchange() {
            Ok(value) => return Ok(value),
            Err(snmp2::Error::AuthUpdated) if !engine_discovered => {
                tracing::debug!("SNMPv3 engine ID discovered, retrying request");
                engine_discovered = true;
            }
            Err(snmp2::Error::Receive) if attempts < retries => {
                attempts += 1;
                tracing::debug!("SNMP request timed out, retry {}/{}", attempts, retries);
            }
            Err(e) => return Err(map_snmp_error(e)),
        }
    }
}

fn open_session(device: &DeviceCredentials, options: ClientOptions) -> SnmpResult<SyncSession> {
    let addr = device.socket_addr();
    let timeout = Some(options.timeout);
    let req_id = 1;

    match (&device.credentials, device.version) {
        (Credentials::Community(community), SnmpVersion::V1) => {
            SyncSession::new_v1(addr.as_str(), community.expose().as_bytes(), timeout, req_id)
                .map_err(|_| SnmpError::Unreachable)
        }
        (Credentials::Community(community), SnmpVersion::V2c) => {
            SyncSession::new_v2c(addr.as_str(), community.expose().as_bytes(), timeout, req_id)
                .map_err(|_| SnmpError::Unreachable)
        }
        (Credentials::Usm(usm), SnmpVersion::V3) => {
            open_v3_session(&addr, timeout, req_id, usm, options.retries)
        }
        (credentials, version) => {
            tracing::warn!(
                "Credential mode {} does not match SNMP {} for {}",
                match credentials {
                    Credentials::Community(_) => "community",
                    Credentials::Usm(_) => "usm",
                },
                version,
                device.device_id
            );
            Err(SnmpError::AuthFailure)
        }
    }
}

fn open_v3_session(
    addr: &str,
    timeout: Option<Duration>,
    req_id: i32,
    usm: &UsmCredentials,
    retries: u32,
) -> SnmpResult<SyncSession> {
    use snmp2::v3::{Auth, Security};

    let auth = match (&usm.auth, &usm.privacy) {
        (None, _) => Auth::NoAuthNoPriv,
        (Some(_), None) => Auth::AuthNoPriv,
        (Some(_), Some((cipher, key))) => Auth::AuthPriv {
            cipher: to_snmp2_cipher(*cipher),
            privacy_password: key.expose().as_bytes().to_vec(),
        },
    };

    let auth_password = usm
        .auth
        .as_ref()
        .map(|(_, key)| key.expose())
        .unwrap_or("")
        .as_bytes();

    let mut security = Security::new(usm.username.as_bytes(), auth_password).with_auth(auth);
    if let Some((protocol, _)) = &usm.auth {
        security = security.with_auth_protocol(to_snmp2_auth_protocol(*protocol));
    }

    let mut session =
        SyncSession::new_v3(addr, timeout, req_id, security).map_err(|_| SnmpError::Unreachable)?;

    if usm.auth.is_some() {
        with_retries(retries, || session.init())?;
    }

    Ok(session)
}

fn to_snmp2_auth_protocol(protocol: AuthProtocol) -> snmp2::v3::AuthProtocol {
    use snmp2::v3::AuthProtocol as P;

    match protocol {
        AuthProtocol::Md5 => P::Md5,
        AuthProtocol::Sha1 => P::Sha1,
        AuthProtocol::Sha224 => P::Sha224,
        AuthProtocol::Sha256 => P::Sha256,
        AuthProtocol::Sha384 => P::Sha384,
        AuthProtocol::Sha512 => P::Sha512,
    }
}

fn to_snmp2_cipher(protocol: PrivProtocol) -> snmp2::v3::Cipher {
    use snmp2::v3::Cipher;

    match protocol {
        PrivProtocol::Des => Cipher::Des,
        PrivProtocol::Aes128 => Cipher::Aes128,
        PrivProtocol::Aes192 => Cipher::Aes192,
        PrivProtocol::Aes256 => Cipher::Aes256,
    }
}

fn parse_oid(oid: &str) -> SnmpResult<Oid<'static>> {
    Oid::from_str(oid).map_err(|_| SnmpError::InvalidOid(oid.to_string()))
}

fn oid_components(oid: &str) -> SnmpResult<Vec<u32>> {
    oid.split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| SnmpError::MalformedResponse(format!("Unparseable OID {}", oid)))
        })
        .collect()
}

/// Convert a varbind value. Exception values (noSuchObject, noSuchInstance,
/// endOfMibView) yield `None`.
fn convert_value(value: snmp2::Value) -> Option<SnmpValue> {
    use snmp2::Value as V;

    match value {
        V::Integer(i) => Some(SnmpValue::Integer(i)),
        V::OctetString(bytes) => Some(SnmpValue::OctetString(bytes.to_vec())),
        V::ObjectIdentifier(oid) => Some(SnmpValue::Oid(oid.to_string())),
        V::Counter32(c) => Some(SnmpValue::Counter32(c)),
        V::Counter64(c) => Some(SnmpValue::Counter64(c)),
        V::Unsigned32(g) => Some(SnmpValue::Gauge32(g)),
        V::Timeticks(t) => Some(SnmpValue::TimeTicks(t)),
        V::IpAddress(ip) => Some(SnmpValue::IpAddress(ip)),
        V::Null => Some(SnmpValue::Null),
        V::NoSuchObject | V::NoSuchInstance | V::EndOfMibView => None,
        other => Some(SnmpValue::Unsupported(format!("{:?}", other))),
    }
}

fn map_snmp_error(err: snmp2::Error) -> SnmpError {
    use snmp2::Error;

    match err {
        Error::Send => SnmpError::Unreachable,
        Error::Receive => SnmpError::Timeout,
        Error::CommunityMismatch => SnmpError::AuthFailure,
        Error::AuthFailure(kind) => {
            tracing::debug!("SNMPv3 AuthFailure: {:?}", kind);
            SnmpError::AuthFailure
        }
        other => SnmpError::MalformedResponse(format!("{:?}", other)),
    }
}
