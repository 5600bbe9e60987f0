//! Worker primitives for the Herald authority.
//!
//! Provides classified task spawning, panic containment for joined tasks,
//! per-job lifecycle tracking, and the [`ExecutionQueue`] that serializes
//! jobs touching shared session state.

mod class;
mod panic;
pub mod queue;
pub mod registry;
mod spawn;

pub use class::TaskClass;
pub use panic::join_error_panic_message;
pub use queue::{DEFAULT_PACING, ExecutionQueue, JobFuture, JobOutcome, JobTicket, QueueConfig, QueueError};
pub use registry::{JobId, JobRecord, JobRegistry, JobState};
pub use spawn::spawn;
