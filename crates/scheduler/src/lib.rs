//! Scheduled emission engine.
//!
//! - [`Scheduler`] turns a snapshot of stored definitions into one-shot and
//!   periodic emission tasks and rebuilds the whole set on restart.
//! - [`Emitter`] stamps, serializes, publishes and broadcasts one definition.
//! - [`RestartSignal`] is the coalescing, never-blocking reload trigger.
//! - [`SignalingStore`] fires the restart signal on every successful write.

pub mod emission;
pub mod scheduler;
pub mod signal;
pub mod signaling_store;

pub use emission::{EmitError, Emitter};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerStatus};
pub use signal::RestartSignal;
pub use signaling_store::SignalingStore;
