use super::{DeviceStatusUpdate, InterfaceRecord, MetricRecord, Persistence};
use crate::registry::DeviceId;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One write, in the order it reached the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Status(DeviceId, DeviceStatusUpdate),
    Metric(DeviceId, MetricRecord),
    Interface(DeviceId, u32),
}

/// Events kept before the oldest are dropped
pub const DEFAULT_MAX_EVENTS: usize = 10_000;
/// Metric samples kept per device before the oldest are dropped
pub const DEFAULT_MAX_METRICS_PER_DEVICE: usize = 1_000;

#[derive(Default)]
struct MemoryState {
    events: VecDeque<StoreEvent>,
    status: HashMap<DeviceId, DeviceStatusUpdate>,
    metrics: HashMap<DeviceId, VecDeque<MetricRecord>>,
    interfaces: HashMap<DeviceId, BTreeMap<u32, InterfaceRecord>>,
}

/// In-process store for dry runs and tests.
///
/// Event and metric history is bounded; status and interfaces hold one
/// entry per device or index and are not.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    max_events: usize,
    max_metrics: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_EVENTS, DEFAULT_MAX_METRICS_PER_DEVICE)
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
    queue.push_back(item);
    while queue.len() > limit {
        queue.pop_front();
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_events` events and `max_metrics` samples per device.
    pub fn with_limits(max_events: usize, max_metrics: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            max_events: max_events.max(1),
            max_metrics: max_metrics.max(1),
        }
    }

    fn record_event(&self, state: &mut MemoryState, event: StoreEvent) {
        push_bounded(&mut state.events, event, self.max_events);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recorded writes, oldest first
    pub fn events(&self) -> Vec<StoreEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Latest status update written for the device
    pub fn status(&self, device_id: &DeviceId) -> Option<DeviceStatusUpdate> {
        self.lock().status.get(device_id).cloned()
    }

    pub fn metrics(&self, device_id: &DeviceId) -> Vec<MetricRecord> {
        self.lock()
            .metrics
            .get(device_id)
            .map(|metrics| metrics.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn interfaces(&self, device_id: &DeviceId) -> BTreeMap<u32, InterfaceRecord> {
        self.lock()
            .interfaces
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn update_device_status(
        &self,
        device_id: &DeviceId,
        update: DeviceStatusUpdate,
    ) -> Result<()> {
        let mut state = self.lock();
        self.record_event(&mut state, StoreEvent::Status(device_id.clone(), update.clone()));
        state.status.insert(device_id.clone(), update);
        Ok(())
    }

    async fn insert_metric(&self, device_id: &DeviceId, metric: MetricRecord) -> Result<()> {
        let mut state = self.lock();
        self.record_event(&mut state, StoreEvent::Metric(device_id.clone(), metric.clone()));
        let metrics = state.metrics.entry(device_id.clone()).or_default();
        push_bounded(metrics, metric, self.max_metrics);
        Ok(())
    }

    async fn upsert_interface(
        &self,
        device_id: &DeviceId,
        interface_index: u32,
        record: InterfaceRecord,
    ) -> Result<()> {
        let mut state = self.lock();
        self.record_event(&mut state, StoreEvent::Interface(device_id.clone(), interface_index));
        state
            .interfaces
            .entry(device_id.clone())
            .or_default()
            .insert(interface_index, record);
        Ok(())
    }
}
