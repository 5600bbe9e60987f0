//! Action routing and serialized execution for Herald.
//!
//! A client turns a click into an [`ActionRequest`](herald_invocation::ActionRequest)
//! and hands it to the single [`Authority`], either directly or through a
//! [`Transport`]. The authority deduplicates by nonce and runs each accepted
//! request as one job on its execution queue. A job resolves the selector to a
//! candidate operation, takes exclusive control of the shared targeting state,
//! invokes the operation, and restores that state afterwards.
//!
//! Collaborators (records, the targeting surface, notification delivery, and
//! the transport) are traits; [`memory`] provides in-process implementations.

mod authority;
mod client;
pub mod config;
mod error;
pub mod logging;
pub mod memory;
mod notify;
pub mod record;
mod resolver;
pub mod runtime;
mod selection;
mod suppression;

pub use authority::{Authority, Pong, Submission};
pub use client::{ClientRouter, SelfTargetSource, Transport};
pub use config::{RouterConfig, Timings};
pub use error::{ClientError, ConfigError, RouteError};
pub use notify::{ApplySummary, Delivery, Notification, NotificationBus, NotificationKind, NotificationSink};
pub use record::{Candidate, FnOperation, InvokeContext, KindSet, MemoryDirectory, MemoryRecord, Operation, Record, RecordDirectory, operation_fn};
pub use resolver::{MatchKind, OperationResolver, Resolution};
pub use selection::{Acquired, ContextId, Entity, EntityId, SelectionManager, SelectionSnapshot, TargetingSurface};
pub use suppression::{SuppressionWindows, WindowHandle};
