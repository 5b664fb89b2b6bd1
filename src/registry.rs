use crate::poller::SchedulerHandle;
use crate::snmp::DeviceCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::Mutex;

/// Identifier of a monitored device, as assigned by the device datastore
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Held for the whole duration of a poll cycle
pub type CycleGuard = Arc<Mutex<()>>;

struct Registration {
    credentials: Arc<DeviceCredentials>,
    handle: Option<SchedulerHandle>,
    guard: CycleGuard,
}

#[derive(Default)]
struct RegistryState {
    devices: HashMap<DeviceId, Registration>,
    // Outlives the registration while a cycle still holds the guard, so a
    // stop followed by a quick start cannot overlap the finishing cycle.
    guards: HashMap<DeviceId, Weak<Mutex<()>>>,
}

/// Client configuration and scheduler handle of every monitored device.
/// All mutations go through one write lock.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store or replace the client configuration for a device.
    /// An installed scheduler handle is kept. Returns the device's cycle guard.
    pub fn register(&self, credentials: DeviceCredentials) -> CycleGuard {
        let device_id = credentials.device_id.clone();
        let credentials = Arc::new(credentials);
        let mut state = self.write();

        if let Some(registration) = state.devices.get_mut(&device_id) {
            registration.credentials = credentials;
            return Arc::clone(&registration.guard);
        }

        state.guards.retain(|_, guard| guard.strong_count() > 0);
        let guard = state
            .guards
            .get(&device_id)
            .and_then(Weak::upgrade)
            .unwrap_or_default();
        state
            .guards
            .insert(device_id.clone(), Arc::downgrade(&guard));

        state.devices.insert(
            device_id.clone(),
            Registration {
                credentials,
                handle: None,
                guard: Arc::clone(&guard),
            },
        );

        tracing::debug!(
            "Registered device {} (total: {})",
            device_id,
            state.devices.len()
        );
        guard
    }

    /// Remove a device, stopping its scheduler first. Returns false if unknown.
    pub fn unregister(&self, device_id: &DeviceId) -> bool {
        let mut state = self.write();
        match state.devices.remove(device_id) {
            Some(registration) => {
                if let Some(handle) = registration.handle {
                    handle.stop();
                }
                tracing::info!(
                    "Unregistered device {} (remaining: {})",
                    device_id,
                    state.devices.len()
                );
                true
            }
            None => false,
        }
    }

    pub fn credentials(&self, device_id: &DeviceId) -> Option<Arc<DeviceCredentials>> {
        self.read()
            .devices
            .get(device_id)
            .map(|registration| Arc::clone(&registration.credentials))
    }

    pub fn scheduler_handle(&self, device_id: &DeviceId) -> Option<SchedulerHandle> {
        self.read()
            .devices
            .get(device_id)
            .and_then(|registration| registration.handle.clone())
    }

    pub fn cycle_guard(&self, device_id: &DeviceId) -> Option<CycleGuard> {
        self.read()
            .devices
            .get(device_id)
            .map(|registration| Arc::clone(&registration.guard))
    }

    /// Install a scheduler handle, stopping the one it replaces under the
    /// same lock. If the device is no longer registered the new handle is
    /// stopped instead and false is returned.
    pub fn install_handle(&self, device_id: &DeviceId, handle: SchedulerHandle) -> bool {
        let mut state = self.write();
        match state.devices.get_mut(device_id) {
            Some(registration) => {
                if let Some(previous) = registration.handle.replace(handle) {
                    previous.stop();
                }
                true
            }
            None => {
                handle.stop();
                false
            }
        }
    }

    /// Detach the scheduler handle, leaving the configuration registered
    pub fn take_handle(&self, device_id: &DeviceId) -> Option<SchedulerHandle> {
        self.write()
            .devices
            .get_mut(device_id)
            .and_then(|registration| registration.handle.take())
    }

    pub fn list_devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.read().devices.keys().cloned().collect();
        devices.sort();
        devices
    }

    pub fn count(&self) -> usize {
        self.read().devices.len()
    }

    /// Stop every scheduler and drop all registrations
    pub fn shutdown_all(&self) {
        let mut state = self.write();
        if !state.devices.is_empty() {
            tracing::info!("Stopping {} device schedules", state.devices.len());
        }

        for (device_id, registration) in state.devices.drain() {
            if let Some(handle) = registration.handle {
                handle.stop();
            }
            tracing::debug!("Stopped monitoring {}", device_id);
        }
    }
}
