//! Single-authority execution queue.
//!
//! When serialized (the default) jobs run strictly in FIFO arrival order: one
//! job runs to completion before the next is popped, followed by a fixed
//! pacing delay so downstream notifications settle before the next job reads
//! shared state. When serialization is disabled every job is spawned on
//! submission with no ordering guarantee.
//!
//! A job that returns an error or panics is marked failed and the queue moves
//! on. There is no retry and no mid-flight cancellation of a running job.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::{JobId, JobRecord, JobRegistry, JobState};
use crate::{TaskClass, join_error_panic_message, spawn};

#[cfg(test)]
mod tests;

/// Boxed job body. Errors are reported as plain messages.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'static>>;

/// Default delay between two serialized jobs.
pub const DEFAULT_PACING: Duration = Duration::from_millis(150);

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Run jobs one at a time in arrival order.
	pub serialize: bool,
	/// Delay after each serialized job before the next one starts.
	pub pacing: Duration,
	/// Number of terminal job records kept in the registry.
	pub history: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			serialize: true,
			pacing: DEFAULT_PACING,
			history: crate::registry::DEFAULT_JOB_HISTORY,
		}
	}
}

/// Terminal result delivered to a job's ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
	Done,
	Failed(String),
	/// The queue shut down before the job started.
	Dropped,
}

/// Error returned when submitting to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
	#[error("execution queue is shut down")]
	Closed,
}

/// Handle for one submitted job.
#[derive(Debug)]
pub struct JobTicket {
	id: JobId,
	done: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
	pub fn id(&self) -> JobId {
		self.id
	}

	/// Waits for the job to reach a terminal state.
	pub async fn outcome(self) -> JobOutcome {
		self.done.await.unwrap_or(JobOutcome::Dropped)
	}
}

struct QueuedJob {
	id: JobId,
	label: String,
	enqueued_at: Instant,
	body: JobFuture,
	done: oneshot::Sender<JobOutcome>,
}

#[derive(Default)]
struct QueueState {
	pending: VecDeque<QueuedJob>,
	draining: bool,
}

struct QueueInner {
	config: QueueConfig,
	state: Mutex<QueueState>,
	next_id: AtomicU64,
	registry: JobRegistry,
	shutdown: CancellationToken,
}

impl QueueInner {
	fn lock_state(&self) -> MutexGuard<'_, QueueState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Job scheduler for the authority.
#[derive(Clone)]
pub struct ExecutionQueue {
	inner: Arc<QueueInner>,
}

impl Default for ExecutionQueue {
	fn default() -> Self {
		Self::new(QueueConfig::default())
	}
}

impl std::fmt::Debug for ExecutionQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecutionQueue")
			.field("serialize", &self.inner.config.serialize)
			.field("pending", &self.pending_len())
			.field("draining", &self.is_draining())
			.finish()
	}
}

impl ExecutionQueue {
	pub fn new(config: QueueConfig) -> Self {
		let registry = JobRegistry::new(config.history);
		Self {
			inner: Arc::new(QueueInner {
				config,
				state: Mutex::new(QueueState::default()),
				next_id: AtomicU64::new(1),
				registry,
				shutdown: CancellationToken::new(),
			}),
		}
	}

	pub fn is_serialized(&self) -> bool {
		self.inner.config.serialize
	}

	/// Submits one job.
	///
	/// Serialized queues enqueue the job and make sure a drain loop is
	/// running. Unserialized queues spawn the job immediately.
	pub fn submit<F>(&self, label: impl Into<String>, body: F) -> Result<JobTicket, QueueError>
	where
		F: Future<Output = Result<(), String>> + Send + 'static,
	{
		if self.inner.shutdown.is_cancelled() {
			return Err(QueueError::Closed);
		}

		let id = JobId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let label = label.into();
		let enqueued_at = Instant::now();
		let (done_tx, done_rx) = oneshot::channel();

		self.inner.registry.insert(JobRecord {
			id,
			label: label.clone(),
			state: JobState::Pending,
			enqueued_at,
			finished_after: None,
			failure: None,
		});
		tracing::debug!(job_id = %id, label = %label, serialized = self.inner.config.serialize, "queue.submit");

		let job = QueuedJob {
			id,
			label,
			enqueued_at,
			body: Box::pin(body),
			done: done_tx,
		};

		if self.inner.config.serialize {
			self.inner.lock_state().pending.push_back(job);
			self.drain_loop();
		} else {
			let inner = Arc::clone(&self.inner);
			spawn(TaskClass::Background, async move { run_job(&inner, job).await });
		}

		Ok(JobTicket { id, done: done_rx })
	}

	/// Starts draining pending jobs if no drain loop is active.
	///
	/// Returns `true` if this call started a drain loop. Calling it while a
	/// drain is already running (or with nothing pending) is a no-op.
	pub fn drain_loop(&self) -> bool {
		{
			let mut state = self.inner.lock_state();
			if state.draining || state.pending.is_empty() || self.inner.shutdown.is_cancelled() {
				return false;
			}
			state.draining = true;
		}
		let inner = Arc::clone(&self.inner);
		spawn(TaskClass::Background, drain(inner));
		true
	}

	/// Stops accepting jobs and drops everything still pending.
	///
	/// A job that is already running completes normally. Returns the number
	/// of pending jobs dropped. Idempotent.
	pub fn shutdown(&self) -> usize {
		self.inner.shutdown.cancel();
		let dropped: Vec<QueuedJob> = self.inner.lock_state().pending.drain(..).collect();
		for job in &dropped {
			self.inner.registry.remove(job.id);
		}
		if !dropped.is_empty() {
			tracing::warn!(dropped = dropped.len(), "queue.shutdown.dropped_pending");
		}
		dropped.len()
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shutdown.is_cancelled()
	}

	pub fn pending_len(&self) -> usize {
		self.inner.lock_state().pending.len()
	}

	pub fn is_draining(&self) -> bool {
		self.inner.lock_state().draining
	}

	pub fn state(&self, id: JobId) -> Option<JobState> {
		self.inner.registry.state(id)
	}

	pub fn registry(&self) -> &JobRegistry {
		&self.inner.registry
	}
}

async fn drain(inner: Arc<QueueInner>) {
	tracing::trace!("queue.drain.start");
	loop {
		let job = {
			let mut state = inner.lock_state();
			let next = if inner.shutdown.is_cancelled() { None } else { state.pending.pop_front() };
			match next {
				Some(job) => job,
				None => {
					state.draining = false;
					break;
				}
			}
		};

		run_job(&inner, job).await;

		if !inner.config.pacing.is_zero() {
			tokio::select! {
				_ = tokio::time::sleep(inner.config.pacing) => {}
				_ = inner.shutdown.cancelled() => {}
			}
		}
	}
	tracing::trace!("queue.drain.idle");
}

async fn run_job(inner: &QueueInner, job: QueuedJob) {
	let QueuedJob {
		id,
		label,
		enqueued_at,
		body,
		done,
	} = job;

	inner.registry.transition(id, JobState::Running, None);
	tracing::debug!(job_id = %id, label = %label, waited_ms = enqueued_at.elapsed().as_millis() as u64, "queue.job.start");

	// The body runs as its own task so a panic is contained to this job.
	let outcome = match spawn(TaskClass::Interactive, body).await {
		Ok(Ok(())) => JobOutcome::Done,
		Ok(Err(reason)) => JobOutcome::Failed(reason),
		Err(err) => JobOutcome::Failed(join_error_panic_message(err).unwrap_or_else(|| "job task was cancelled".to_string())),
	};

	match &outcome {
		JobOutcome::Failed(reason) => {
			tracing::warn!(job_id = %id, label = %label, reason = %reason, "queue.job.failed");
			inner.registry.transition(id, JobState::Failed, Some(reason.clone()));
		}
		_ => {
			tracing::debug!(job_id = %id, label = %label, "queue.job.done");
			inner.registry.transition(id, JobState::Done, None);
		}
	}

	let _ = done.send(outcome);
}
