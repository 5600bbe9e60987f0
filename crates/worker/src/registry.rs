use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Monotonic identifier assigned to a job at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl JobId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "job#{}", self.0)
	}
}

/// Lifecycle state of one queued job.
///
/// Terminal states are never left again; failed jobs are not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
	Pending,
	Running,
	Done,
	Failed,
}

impl JobState {
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Done | Self::Failed)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Running => "running",
			Self::Done => "done",
			Self::Failed => "failed",
		}
	}
}

/// Snapshot for one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
	pub id: JobId,
	pub label: String,
	pub state: JobState,
	pub enqueued_at: Instant,
	pub finished_after: Option<Duration>,
	pub failure: Option<String>,
}

/// Default number of terminal records retained for inspection.
pub const DEFAULT_JOB_HISTORY: usize = 256;

/// In-memory job registry for status snapshots.
///
/// Active jobs are always kept. Terminal jobs are pruned oldest-first once
/// more than `history` of them accumulate.
#[derive(Debug, Clone)]
pub struct JobRegistry {
	inner: Arc<RwLock<BTreeMap<JobId, JobRecord>>>,
	history: usize,
}

impl Default for JobRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_JOB_HISTORY)
	}
}

impl JobRegistry {
	/// Creates an empty registry retaining up to `history` terminal records.
	pub fn new(history: usize) -> Self {
		Self {
			inner: Arc::new(RwLock::new(BTreeMap::new())),
			history,
		}
	}

	pub(crate) fn insert(&self, record: JobRecord) {
		if let Ok(mut guard) = self.inner.write() {
			guard.insert(record.id, record);
		}
	}

	pub(crate) fn transition(&self, id: JobId, state: JobState, failure: Option<String>) {
		let Ok(mut guard) = self.inner.write() else {
			return;
		};
		if let Some(record) = guard.get_mut(&id) {
			debug_assert!(!record.state.is_terminal(), "job {id} left terminal state {}", record.state.as_str());
			record.state = state;
			record.failure = failure;
			if state.is_terminal() {
				record.finished_after = Some(record.enqueued_at.elapsed());
			}
		}
		if state.is_terminal() {
			prune_terminal(&mut guard, self.history);
		}
	}

	pub(crate) fn remove(&self, id: JobId) {
		if let Ok(mut guard) = self.inner.write() {
			guard.remove(&id);
		}
	}

	/// Returns the current state of one job, if still tracked.
	pub fn state(&self, id: JobId) -> Option<JobState> {
		self.inner.read().ok()?.get(&id).map(|r| r.state)
	}

	/// Returns one record, if still tracked.
	pub fn get(&self, id: JobId) -> Option<JobRecord> {
		self.inner.read().ok()?.get(&id).cloned()
	}

	/// Returns snapshots in submission order.
	pub fn snapshots(&self) -> Vec<JobRecord> {
		let Ok(guard) = self.inner.read() else {
			return Vec::new();
		};
		guard.values().cloned().collect()
	}

	/// Number of jobs currently in a given state.
	pub fn count(&self, state: JobState) -> usize {
		let Ok(guard) = self.inner.read() else {
			return 0;
		};
		guard.values().filter(|r| r.state == state).count()
	}
}

fn prune_terminal(records: &mut BTreeMap<JobId, JobRecord>, history: usize) {
	let terminal: Vec<JobId> = records.values().filter(|r| r.state.is_terminal()).map(|r| r.id).collect();
	if terminal.len() <= history {
		return;
	}
	for id in &terminal[..terminal.len() - history] {
		records.remove(id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(id: u64) -> JobRecord {
		JobRecord {
			id: JobId(id),
			label: format!("job-{id}"),
			state: JobState::Pending,
			enqueued_at: Instant::now(),
			finished_after: None,
			failure: None,
		}
	}

	#[tokio::test]
	async fn transitions_are_visible_in_snapshots() {
		let registry = JobRegistry::default();
		registry.insert(record(1));
		registry.transition(JobId(1), JobState::Running, None);
		assert_eq!(registry.state(JobId(1)), Some(JobState::Running));

		registry.transition(JobId(1), JobState::Failed, Some("boom".into()));
		let snap = registry.get(JobId(1)).expect("tracked");
		assert_eq!(snap.state, JobState::Failed);
		assert_eq!(snap.failure.as_deref(), Some("boom"));
		assert!(snap.finished_after.is_some());
	}

	#[tokio::test]
	async fn prunes_oldest_terminal_records_only() {
		let registry = JobRegistry::new(2);
		for id in 1..=4 {
			registry.insert(record(id));
		}
		registry.transition(JobId(4), JobState::Running, None);
		for id in 1..=3 {
			registry.transition(JobId(id), JobState::Done, None);
		}

		let ids: Vec<u64> = registry.snapshots().iter().map(|r| r.id.get()).collect();
		assert_eq!(ids, vec![2, 3, 4]);
		assert_eq!(registry.count(JobState::Running), 1);
	}
}
