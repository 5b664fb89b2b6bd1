use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::secret::SecretString;
use crate::snmp::{
    AuthProtocol, ClientOptions, DeviceCredentials, PrivProtocol, SnmpVersion, UsmCredentials,
    DEFAULT_RETRIES, DEFAULT_TIMEOUT,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "snmp-monitor.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Monitor configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub snmp: SnmpSettings,
    pub database_path: PathBuf,
    pub devices: Vec<DeviceEntry>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            snmp: SnmpSettings::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            devices: Vec::new(),
        }
    }
}

/// Protocol client settings shared by every device
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnmpSettings {
    pub timeout_ms: u64,
    pub retries: u32,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// One device to monitor
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub address: String,
    pub port: Option<u16>,
    #[serde(default = "default_version")]
    pub version: String,
    pub community: Option<SecretString>,
    pub username: Option<String>,
    pub auth_protocol: Option<String>,
    pub auth_key: Option<SecretString>,
    pub priv_protocol: Option<String>,
    pub priv_key: Option<SecretString>,
    pub poll_interval_ms: Option<u64>,
}

fn default_version() -> String {
    "2c".to_string()
}

impl DeviceEntry {
    pub fn snmp_version(&self) -> Result<SnmpVersion> {
        self.version
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("device {}: {}", self.id, e)))
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    pub fn to_credentials(&self) -> Result<DeviceCredentials> {
        let credentials = match self.snmp_version()? {
            version @ (SnmpVersion::V1 | SnmpVersion::V2c) => {
                let community = self
                    .community
                    .as_ref()
                    .filter(|community| !community.is_empty())
                    .ok_or_else(|| self.invalid("community is required for v1/v2c"))?;
                let mut credentials = DeviceCredentials::community(
                    self.id.as_str(),
                    self.address.as_str(),
                    community.expose(),
                );
                credentials.version = version;
                credentials
            }
            SnmpVersion::V3 => DeviceCredentials::usm(
                self.id.as_str(),
                self.address.as_str(),
                self.usm_credentials()?,
            ),
        };

        Ok(match self.port {
            Some(port) => credentials.with_port(port),
            None => credentials,
        })
    }

    fn usm_credentials(&self) -> Result<UsmCredentials> {
        let username = self
            .username
            .as_ref()
            .filter(|username| !username.is_empty())
            .ok_or_else(|| self.invalid("username is required for v3"))?;

        let auth = match &self.auth_key {
            Some(key) => {
                let protocol = match &self.auth_protocol {
                    Some(protocol) => protocol
                        .parse::<AuthProtocol>()
                        .map_err(|e| self.invalid(&e.to_string()))?,
                    None => AuthProtocol::Sha1,
                };
                Some((protocol, key.clone()))
            }
            None => None,
        };

        let privacy = match &self.priv_key {
            Some(_) if auth.is_none() => {
                return Err(self.invalid("priv_key requires auth_key"));
            }
            Some(key) => {
                let protocol = match &self.priv_protocol {
                    Some(protocol) => protocol
                        .parse::<PrivProtocol>()
                        .map_err(|e| self.invalid(&e.to_string()))?,
                    None => PrivProtocol::Aes128,
                };
                Some((protocol, key.clone()))
            }
            None => None,
        };

        Ok(UsmCredentials {
            username: username.clone(),
            auth,
            privacy,
        })
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Invalid(format!("device {}: {}", self.id, reason))
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.snmp.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "snmp.timeout_ms must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.is_empty() {
                return Err(ConfigError::Invalid("device id must not be empty".to_string()));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(device.invalid("duplicate device id"));
            }
            if device.address.is_empty() {
                return Err(device.invalid("address must not be empty"));
            }
            if device.poll_interval_ms == Some(0) {
                return Err(device.invalid("poll_interval_ms must be greater than 0"));
            }
            device.to_credentials()?;
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_millis(self.snmp.timeout_ms),
            retries: self.snmp.retries,
        }
    }
}
