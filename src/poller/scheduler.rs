use super::orchestrator::{CycleOutcome, PollOrchestrator};
use crate::registry::{CycleGuard, DeviceId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default polling period (5 minutes)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300_000);

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one running schedule of one device.
///
/// Cloning shares the same cancellation token, so any clone can stop the run.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    device_id: DeviceId,
    interval: Duration,
    run_id: u64,
    token: CancellationToken,
}

impl SchedulerHandle {
    fn new(device_id: DeviceId, interval: Duration) -> Self {
        Self {
            device_id,
            interval,
            run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        }
    }

    /// Handle with no task behind it
    #[cfg(test)]
    pub(crate) fn detached(device_id: DeviceId, interval: Duration) -> Self {
        Self::new(device_id, interval)
    }

    /// Cancel the repeating timer. A cycle already in flight runs to completion.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(
                "Stopping schedule #{} for {} (every {:?})",
                self.run_id,
                self.device_id,
                self.interval
            );
            self.token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

/// Start the repeating timer for a device. The first tick fires one
/// `interval` from now; the caller runs the immediate cycle itself.
pub fn spawn_schedule(
    device_id: DeviceId,
    interval: Duration,
    guard: CycleGuard,
    orchestrator: Arc<PollOrchestrator>,
) -> SchedulerHandle {
    let handle = SchedulerHandle::new(device_id, interval);

    tokio::spawn(run_schedule(
        handle.device_id.clone(),
        interval,
        handle.run_id,
        guard,
        orchestrator,
        handle.token.clone(),
    ));

    tracing::info!(
        "Scheduled {} every {:?} (run #{})",
        handle.device_id,
        interval,
        handle.run_id
    );
    handle
}

async fn run_schedule(
    device_id: DeviceId,
    period: Duration,
    run_id: u64,
    guard: CycleGuard,
    orchestrator: Arc<PollOrchestrator>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let permit = match Arc::clone(&guard).try_lock_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(
                    "Previous poll cycle for {} still running, skipping tick",
                    device_id
                );
                continue;
            }
        };

        let orchestrator = Arc::clone(&orchestrator);
        let cycle_device = device_id.clone();
        let cycle_token = token.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let CycleOutcome::Unregistered = orchestrator.run_cycle(&cycle_device).await {
                cycle_token.cancel();
            }
        });
    }

    tracing::debug!("Schedule #{} for {} finished", run_id, device_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_five_minutes() {
        assert_eq!(DEFAULT_POLL_INTERVAL, Duration::from_secs(300));
    }

    #[test]
    fn test_handle_stop_is_shared_between_clones() {
        let handle = SchedulerHandle::detached(DeviceId::from("sw1"), Duration::from_secs(10));
        let clone = handle.clone();
        assert!(clone.is_running());

        handle.stop();
        assert!(!clone.is_running());
        // second stop is harmless
        clone.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = SchedulerHandle::detached(DeviceId::from("sw1"), Duration::from_secs(10));
        let b = SchedulerHandle::detached(DeviceId::from("sw1"), Duration::from_secs(10));
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.device_id(), &DeviceId::from("sw1"));
    }
}
