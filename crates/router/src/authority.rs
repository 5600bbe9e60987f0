//! The authority job pipeline.
//!
//! Every accepted request becomes one [`ExecutionQueue`] job:
//!
//! ```text
//! lookup record -> resolve candidate -> repair index -> acquire targets
//!   -> [open suppression window] -> invoke -> release delay -> release
//! ```
//!
//! Release runs whether or not the invocation succeeded. Every failure is
//! handled at the job boundary; nothing a job does can take the authority
//! down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use herald_invocation::{ActionKind, ActionRequest, MAX_NONCE_CAPACITY, NonceCache, decode_envelope};
use herald_worker::{ExecutionQueue, JobOutcome, JobTicket, TaskClass, join_error_panic_message, spawn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::notify::{ApplySummary, Notification, NotificationBus, NotificationSink};
use crate::record::{Candidate, InvokeContext, RecordDirectory};
use crate::resolver::OperationResolver;
use crate::selection::{Acquired, SelectionManager, TargetingSurface};

/// Result of handing a request to the authority.
#[derive(Debug)]
pub enum Submission {
	Queued(JobTicket),
	/// The nonce was already accepted; nothing was queued.
	Duplicate,
}

impl Submission {
	pub fn is_duplicate(&self) -> bool {
		matches!(self, Self::Duplicate)
	}
}

/// Liveness reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
	pub authority: String,
	pub from: String,
	pub at: DateTime<Utc>,
}

/// The single peer that resolves and invokes operations against shared state.
pub struct Authority {
	id: String,
	config: RouterConfig,
	nonces: Mutex<NonceCache>,
	records: Arc<dyn RecordDirectory>,
	selection: SelectionManager,
	resolver: OperationResolver,
	bus: NotificationBus,
	queue: ExecutionQueue,
	disposed: AtomicBool,
}

impl std::fmt::Debug for Authority {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Authority")
			.field("id", &self.id)
			.field("queue", &self.queue)
			.field("disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}

impl Authority {
	pub fn new(
		id: impl Into<String>,
		config: RouterConfig,
		records: Arc<dyn RecordDirectory>,
		surface: Arc<dyn TargetingSurface>,
		sink: Arc<dyn NotificationSink>,
	) -> Arc<Self> {
		let id = id.into();
		let selection = SelectionManager::new(surface, config.view_target_context, config.timings.settle());
		let queue = ExecutionQueue::new(config.queue_config());
		tracing::info!(authority = %id, serialize = config.serialize, "authority.ready");
		Arc::new(Self {
			id,
			nonces: Mutex::new(NonceCache::new(config.nonce_capacity.clamp(2, MAX_NONCE_CAPACITY))),
			records,
			selection,
			resolver: OperationResolver,
			bus: NotificationBus::new(sink),
			queue,
			disposed: AtomicBool::new(false),
			config,
		})
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn config(&self) -> &RouterConfig {
		&self.config
	}

	/// Bus through which operations should publish their own feedback.
	pub fn notifications(&self) -> &NotificationBus {
		&self.bus
	}

	pub fn queue(&self) -> &ExecutionQueue {
		&self.queue
	}

	pub fn selection(&self) -> &SelectionManager {
		&self.selection
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	/// Deduplicates `request` and queues it as one job.
	pub fn submit(self: &Arc<Self>, request: ActionRequest) -> Result<Submission, RouteError> {
		if self.is_disposed() {
			return Err(RouteError::Closed);
		}
		if !self.nonces.lock().accept(&request) {
			tracing::debug!(request_id = request.request_id(), "authority.duplicate_ignored");
			return Ok(Submission::Duplicate);
		}

		tracing::debug!(request_id = request.request_id(), request = %request.describe(), "authority.accepted");
		let this = Arc::clone(self);
		let ticket = self
			.queue
			.submit(request.describe(), async move { this.run(request).await.map_err(|err| format!("{}: {err}", err.kind())) })
			.map_err(|_| RouteError::Closed)?;
		Ok(Submission::Queued(ticket))
	}

	/// Decodes an inbound JSON envelope and submits it.
	pub fn handle_envelope(self: &Arc<Self>, envelope: &str) -> Result<Submission, RouteError> {
		let request = decode_envelope(envelope).inspect_err(|err| tracing::warn!(error = %err, "authority.envelope_rejected"))?;
		self.submit(request)
	}

	/// Submits `request` and waits for its job to finish.
	///
	/// Returns `None` for a duplicate.
	pub async fn apply(self: &Arc<Self>, request: ActionRequest) -> Result<Option<JobOutcome>, RouteError> {
		match self.submit(request)? {
			Submission::Queued(ticket) => Ok(Some(ticket.outcome().await)),
			Submission::Duplicate => Ok(None),
		}
	}

	pub fn ping(&self, from: &str) -> Pong {
		tracing::debug!(from, "authority.ping");
		Pong {
			authority: self.id.clone(),
			from: from.to_string(),
			at: Utc::now(),
		}
	}

	/// Stops accepting requests, drops pending jobs, and closes every open
	/// suppression window. Returns `false` if already disposed.
	pub fn dispose(&self) -> bool {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return false;
		}
		let dropped = self.queue.shutdown();
		let windows = self.bus.windows().close_all();
		self.nonces.lock().clear();
		tracing::info!(authority = %self.id, dropped, windows, "authority.disposed");
		true
	}

	async fn run(&self, request: ActionRequest) -> Result<(), RouteError> {
		match self.execute(&request).await {
			Ok(summary) => {
				tracing::info!(
					request_id = request.request_id(),
					record_id = %summary.record_id,
					kind = %summary.kind,
					targets = summary.target_count,
					"authority.applied"
				);
				if self.config.post_summary {
					self.bus.publish(summary.to_notification().with_origin(self.id.clone()));
				}
				Ok(())
			}
			Err(err) => {
				self.report_failure(&request, &err);
				Err(err)
			}
		}
	}

	async fn execute(&self, request: &ActionRequest) -> Result<ApplySummary, RouteError> {
		let record = self
			.records
			.lookup(request.record_id())
			.await
			.ok_or_else(|| RouteError::UnresolvedRecord(request.record_id().clone()))?;

		let resolution = self.resolver.resolve(record.as_ref(), request.selector())?;
		let logical_index = self.resolver.repair(record.as_ref(), &resolution, request.selector());
		let kind = effective_kind(&resolution.candidate, request.action_kind());

		let Acquired { live, snapshot } = self.selection.acquire(request.target_refs()).await?;

		if self.config.suppress_feedback {
			self.bus.windows().open(Notification::is_operation_feedback, self.config.timings.suppression());
		}

		let ctx = InvokeContext {
			request_id: request.request_id().to_string(),
			record_id: request.record_id().clone(),
			logical_index,
			kind,
			block: request.block_flag(),
			targets: live.clone(),
		};
		tracing::debug!(
			request_id = request.request_id(),
			position = resolution.position,
			matched_by = ?resolution.matched_by,
			label = resolution.candidate.label(),
			"authority.invoke"
		);

		let operation = resolution.candidate.operation();
		let invoked = match spawn(TaskClass::Interactive, async move { operation.invoke(ctx).await }).await {
			Ok(result) => result.map_err(RouteError::InvocationFailure),
			Err(err) => {
				let message = join_error_panic_message(err).unwrap_or_else(|| "invocation task was cancelled".to_string());
				Err(RouteError::InvocationFailure(anyhow::anyhow!("operation panicked: {message}")))
			}
		};

		// Side effects of the invocation may still read the job's targets.
		tokio::time::sleep(self.config.timings.release()).await;
		self.selection.release(snapshot).await;

		invoked?;
		Ok(ApplySummary {
			record_id: request.record_id().clone(),
			kind,
			block: request.block_flag(),
			target_count: live.len(),
			logical_index,
		})
	}

	fn report_failure(&self, request: &ActionRequest, err: &RouteError) {
		tracing::warn!(
			request_id = request.request_id(),
			record_id = %request.record_id(),
			kind = err.kind(),
			error = %err,
			"authority.job.failed"
		);
		match err {
			RouteError::NoResolvableTargets(_) => {
				self.bus.publish(
					Notification::warning("Herald: no resolvable targets on the authority.")
						.with_record(request.record_id().clone())
						.with_origin(self.id.clone()),
				);
			}
			RouteError::InvocationFailure(_) if !self.config.suppress_failure_notice => {
				self.bus.publish(
					Notification::error("Herald: apply failed.")
						.with_record(request.record_id().clone())
						.with_origin(self.id.clone()),
				);
			}
			_ => {}
		}
	}
}

/// The requested kind, or the candidate's first supported kind when the
/// candidate cannot apply the requested one.
fn effective_kind(candidate: &Candidate, requested: ActionKind) -> ActionKind {
	let kinds = candidate.kinds();
	if kinds.supports(requested) {
		return requested;
	}
	match kinds.first() {
		Some(kind) => {
			tracing::warn!(requested = %requested, applied = %kind, label = candidate.label(), "authority.kind_degraded");
			kind
		}
		None => requested,
	}
}
