//! Control surface used by the device CRUD layer to start and stop polling.

use crate::persistence::Persistence;
use crate::poller::{spawn_schedule, CycleOutcome, PollOrchestrator, DEFAULT_POLL_INTERVAL};
use crate::registry::{DeviceId, SessionRegistry};
use crate::snmp::{DeviceCredentials, SnmpTransport};
use std::sync::Arc;
use std::time::Duration;

pub struct DeviceMonitor {
    registry: SessionRegistry,
    orchestrator: Arc<PollOrchestrator>,
    default_interval: Duration,
}

impl DeviceMonitor {
    pub fn new(transport: Arc<dyn SnmpTransport>, store: Arc<dyn Persistence>) -> Self {
        let registry = SessionRegistry::new();
        let orchestrator = Arc::new(PollOrchestrator::new(registry.clone(), transport, store));
        Self {
            registry,
            orchestrator,
            default_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            tracing::warn!("Ignoring zero default poll interval");
        } else {
            self.default_interval = interval;
        }
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a device and start polling it.
    ///
    /// Any schedule already running for the device is stopped first. One
    /// cycle runs immediately and its result is returned; the repeating
    /// schedule is installed either way.
    pub async fn start_monitoring(
        &self,
        credentials: DeviceCredentials,
        interval: Option<Duration>,
    ) -> bool {
        let device_id = credentials.device_id.clone();
        let interval = self.resolve_interval(&device_id, interval);

        if let Some(previous) = self.registry.take_handle(&device_id) {
            tracing::info!(
                "Restarting monitoring for {} ({:?} -> {:?})",
                device_id,
                previous.interval(),
                interval
            );
            previous.stop();
        } else {
            tracing::info!(
                "Starting monitoring for {} at {} every {:?}",
                device_id,
                credentials.socket_addr(),
                interval
            );
        }

        let guard = self.registry.register(credentials);

        // Waits for a cycle of the previous run that is still in flight
        let outcome = {
            let _permit = Arc::clone(&guard).lock_owned().await;
            self.orchestrator.run_cycle(&device_id).await
        };

        if outcome == CycleOutcome::Unregistered {
            tracing::info!("Device {} was stopped during its initial poll", device_id);
            return false;
        }

        let handle = spawn_schedule(
            device_id.clone(),
            interval,
            guard,
            Arc::clone(&self.orchestrator),
        );
        if !self.registry.install_handle(&device_id, handle) {
            tracing::info!("Device {} was stopped before its schedule started", device_id);
            return false;
        }

        match &outcome {
            CycleOutcome::Completed { .. } => true,
            other => {
                tracing::warn!("Initial poll of {} did not complete: {:?}", device_id, other);
                false
            }
        }
    }

    /// Stop polling a device. Unknown devices are ignored.
    pub fn stop_monitoring(&self, device_id: &DeviceId) {
        if !self.registry.unregister(device_id) {
            tracing::debug!("Device {} is not monitored, nothing to stop", device_id);
        }
    }

    pub fn is_monitoring(&self, device_id: &DeviceId) -> bool {
        self.registry
            .scheduler_handle(device_id)
            .map(|handle| handle.is_running())
            .unwrap_or(false)
    }

    pub fn monitored_devices(&self) -> Vec<DeviceId> {
        self.registry.list_devices()
    }

    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }

    fn resolve_interval(&self, device_id: &DeviceId, interval: Option<Duration>) -> Duration {
        match interval {
            Some(interval) if interval.is_zero() => {
                tracing::warn!(
                    "Zero poll interval for {}, using {:?}",
                    device_id,
                    self.default_interval
                );
                self.default_interval
            }
            Some(interval) => interval,
            None => self.default_interval,
        }
    }
}
