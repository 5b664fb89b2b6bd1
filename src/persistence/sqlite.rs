use super::{DeviceStatusUpdate, InterfaceRecord, MetricRecord, Persistence};
use crate::correlate::IpBinding;
use crate::registry::DeviceId;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Status row as currently stored
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStatus {
    pub hostname: Option<String>,
    pub uptime: Option<i64>,
    pub status: String,
    pub reachability: String,
    pub memory_utilization: Option<f64>,
}

/// SQLite-backed datastore for device status, metric history and interfaces
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS device_status (
                device_id TEXT PRIMARY KEY,
                hostname TEXT,
                description TEXT,
                uptime INTEGER,
                status TEXT NOT NULL,
                reachability TEXT NOT NULL,
                cpu_utilization REAL,
                memory_utilization REAL,
                last_seen TEXT,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create device_status table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS device_metrics (
                id INTEGER PRIMARY KEY,
                device_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                cpu_utilization REAL,
                memory_utilization REAL,
                temperature REAL,
                free_memory INTEGER,
                total_memory INTEGER
            )",
            [],
        )
        .context("Failed to create device_metrics table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_device_metrics_device ON device_metrics(device_id, timestamp)",
            [],
        )
        .context("Failed to create index")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS interfaces (
                device_id TEXT NOT NULL,
                interface_index INTEGER NOT NULL,
                name TEXT,
                type INTEGER,
                mac_address TEXT NOT NULL,
                oper_status TEXT NOT NULL,
                speed INTEGER,
                mtu INTEGER,
                ip_addresses TEXT NOT NULL,
                in_octets INTEGER,
                out_octets INTEGER,
                in_errors INTEGER,
                out_errors INTEGER,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (device_id, interface_index)
            )",
            [],
        )
        .context("Failed to create interfaces table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_interfaces_mac ON interfaces(mac_address)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    pub fn device_status(&self, device_id: &DeviceId) -> Result<Option<StoredStatus>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT hostname, uptime, status, reachability, memory_utilization
             FROM device_status WHERE device_id = ?1",
            params![device_id.as_str()],
            |row| {
                Ok(StoredStatus {
                    hostname: row.get(0)?,
                    uptime: row.get(1)?,
                    status: row.get(2)?,
                    reachability: row.get(3)?,
                    memory_utilization: row.get(4)?,
                })
            },
        )
        .optional()
        .context("Failed to query device status")
    }

    pub fn metric_count(&self, device_id: &DeviceId) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM device_metrics WHERE device_id = ?1",
            params![device_id.as_str()],
            |row| row.get(0),
        )
        .context("Failed to count metrics")
    }

    /// (interface index, name, oper status, IP bindings) ordered by index
    pub fn interfaces(
        &self,
        device_id: &DeviceId,
    ) -> Result<Vec<(u32, Option<String>, String, Vec<IpBinding>)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT interface_index, name, oper_status, ip_addresses
                 FROM interfaces WHERE device_id = ?1 ORDER BY interface_index",
            )
            .context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![device_id.as_str()], |row| {
                let index: u32 = row.get(0)?;
                let name: Option<String> = row.get(1)?;
                let oper_status: String = row.get(2)?;
                let ip_addresses: String = row.get(3)?;
                Ok((index, name, oper_status, ip_addresses))
            })
            .context("Failed to query interfaces")?;

        let mut interfaces = Vec::new();
        for row in rows {
            let (index, name, oper_status, ip_addresses) = row?;
            let ip_addresses: Vec<IpBinding> = serde_json::from_str(&ip_addresses)
                .context("Failed to decode stored IP addresses")?;
            interfaces.push((index, name, oper_status, ip_addresses));
        }

        Ok(interfaces)
    }
}

/// SQLite integers are signed; values above `i64::MAX` are stored as `i64::MAX`.
fn to_sql_int(value: Option<u64>) -> Option<i64> {
    value.map(|v| {
        i64::try_from(v).unwrap_or_else(|_| {
            tracing::debug!("Clamping {} to {} for storage", v, i64::MAX);
            i64::MAX
        })
    })
}

#[async_trait]
impl Persistence for SqliteStore {
    async fn update_device_status(
        &self,
        device_id: &DeviceId,
        update: DeviceStatusUpdate,
    ) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO device_status (
                device_id, hostname, description, uptime, status, reachability,
                cpu_utilization, memory_utilization, last_seen, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(device_id) DO UPDATE SET
                hostname = COALESCE(excluded.hostname, device_status.hostname),
                description = COALESCE(excluded.description, device_status.description),
                uptime = COALESCE(excluded.uptime, device_status.uptime),
                status = excluded.status,
                reachability = excluded.reachability,
                cpu_utilization = COALESCE(excluded.cpu_utilization, device_status.cpu_utilization),
                memory_utilization = COALESCE(excluded.memory_utilization, device_status.memory_utilization),
                last_seen = COALESCE(excluded.last_seen, device_status.last_seen),
                updated_at = excluded.updated_at",
            params![
                device_id.as_str(),
                update.hostname,
                update.description,
                update.uptime,
                update.status.as_str(),
                update.reachability.as_str(),
                update.cpu_utilization,
                update.memory_utilization_percent,
                update.last_seen.map(|ts| ts.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to update device status")?;

        Ok(())
    }

    async fn insert_metric(&self, device_id: &DeviceId, metric: MetricRecord) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO device_metrics (
                device_id, timestamp, cpu_utilization, memory_utilization,
                temperature, free_memory, total_memory
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                device_id.as_str(),
                metric.timestamp.to_rfc3339(),
                metric.cpu_utilization,
                metric.memory_utilization,
                metric.temperature,
                to_sql_int(metric.free_memory),
                to_sql_int(metric.total_memory),
            ],
        )
        .context("Failed to insert metric")?;

        Ok(())
    }

    async fn upsert_interface(
        &self,
        device_id: &DeviceId,
        interface_index: u32,
        record: InterfaceRecord,
    ) -> Result<()> {
        let ip_addresses = serde_json::to_string(&record.ip_addresses)
            .context("Failed to serialize IP addresses")?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO interfaces (
                device_id, interface_index, name, type, mac_address, oper_status,
                speed, mtu, ip_addresses, in_octets, out_octets, in_errors,
                out_errors, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                device_id.as_str(),
                interface_index,
                record.name,
                record.if_type,
                record.mac_address,
                record.oper_status.as_str(),
                to_sql_int(record.speed),
                record.mtu,
                ip_addresses,
                to_sql_int(record.in_octets),
                to_sql_int(record.out_octets),
                to_sql_int(record.in_errors),
                to_sql_int(record.out_errors),
                record.last_updated.to_rfc3339(),
            ],
        )
        .context("Failed to upsert interface")?;

        Ok(())
    }
}
