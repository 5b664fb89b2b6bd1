pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{CycleOutcome, PerformanceSnapshot, PollOrchestrator, SystemInfo};
pub use scheduler::{spawn_schedule, SchedulerHandle, DEFAULT_POLL_INTERVAL};
