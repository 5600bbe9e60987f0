//! Records and their candidate operations.
//!
//! A record is a shared document supplied by the rendering layer. It exposes
//! an ordered list of [`Candidate`]s, each wrapping an opaque [`Operation`].
//! The router only reads records at resolution time and never keeps its own
//! copy, with one exception: index repair writes a corrected logical index
//! back onto the candidate so later readers observe the same value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use herald_invocation::{ActionKind, RecordId};
use parking_lot::RwLock;

use crate::selection::Entity;

bitflags::bitflags! {
	/// Set of action kinds a candidate supports.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct KindSet: u8 {
		const FULL = 1 << 0;
		const HALF = 1 << 1;
		const DOUBLE = 1 << 2;
		const HEALING = 1 << 3;
		/// Regular damage rows offer every scaled variant.
		const DAMAGE = Self::FULL.bits() | Self::HALF.bits() | Self::DOUBLE.bits();
	}
}

impl KindSet {
	pub const fn of(kind: ActionKind) -> Self {
		match kind {
			ActionKind::Full => Self::FULL,
			ActionKind::Half => Self::HALF,
			ActionKind::Double => Self::DOUBLE,
			ActionKind::Healing => Self::HEALING,
		}
	}

	pub fn supports(self, kind: ActionKind) -> bool {
		self.contains(Self::of(kind))
	}

	/// First supported kind in declaration order.
	pub fn first(self) -> Option<ActionKind> {
		ActionKind::ALL.into_iter().find(|k| self.supports(*k))
	}
}

impl From<ActionKind> for KindSet {
	fn from(kind: ActionKind) -> Self {
		Self::of(kind)
	}
}

impl FromIterator<ActionKind> for KindSet {
	fn from_iter<I: IntoIterator<Item = ActionKind>>(iter: I) -> Self {
		let mut set = KindSet::empty();
		for kind in iter {
			set |= Self::of(kind);
		}
		set
	}
}

/// Everything an operation receives when it is invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeContext {
	pub request_id: String,
	pub record_id: RecordId,
	/// Logical index after repair. `None` only when the record reports no results.
	pub logical_index: Option<usize>,
	pub kind: ActionKind,
	/// Apply the blocking variant (e.g. raise a shield) before the effect.
	pub block: bool,
	/// Resolved live targets, identical to the authority's target set during the call.
	pub targets: Vec<Entity>,
}

/// Opaque invocable exposed by a candidate.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
	async fn invoke(&self, ctx: InvokeContext) -> anyhow::Result<()>;
}

/// Adapts a synchronous closure into an [`Operation`].
pub struct FnOperation<F>(F);

impl<F> FnOperation<F>
where
	F: Fn(InvokeContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
	pub fn new(f: F) -> Self {
		Self(f)
	}
}

/// Wraps a closure as a shareable operation.
pub fn operation_fn<F>(f: F) -> Arc<dyn Operation>
where
	F: Fn(InvokeContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
	Arc::new(FnOperation::new(f))
}

#[async_trait]
impl<F> Operation for FnOperation<F>
where
	F: Fn(InvokeContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
	async fn invoke(&self, ctx: InvokeContext) -> anyhow::Result<()> {
		(self.0)(ctx)
	}
}

/// One invocable action attached to a record.
pub struct Candidate {
	logical_index: RwLock<Option<String>>,
	label: String,
	kinds: KindSet,
	operation: Arc<dyn Operation>,
}

impl fmt::Debug for Candidate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Candidate")
			.field("logical_index", &*self.logical_index.read())
			.field("label", &self.label)
			.field("kinds", &self.kinds)
			.finish_non_exhaustive()
	}
}

impl Candidate {
	pub fn new(label: impl Into<String>, kinds: KindSet, operation: Arc<dyn Operation>) -> Self {
		Self {
			logical_index: RwLock::new(None),
			label: label.into(),
			kinds,
			operation,
		}
	}

	#[must_use]
	pub fn with_logical_index(self, index: impl Into<String>) -> Self {
		*self.logical_index.write() = Some(index.into());
		self
	}

	/// Raw logical index as published by the rendering layer (or by repair).
	pub fn logical_index(&self) -> Option<String> {
		self.logical_index.read().clone()
	}

	/// Logical index parsed as a result position, if it is numeric.
	pub fn numeric_index(&self) -> Option<usize> {
		self.logical_index.read().as_deref().and_then(|s| s.trim().parse().ok())
	}

	pub(crate) fn set_logical_index(&self, index: usize) {
		*self.logical_index.write() = Some(index.to_string());
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn kinds(&self) -> KindSet {
		self.kinds
	}

	pub fn operation(&self) -> Arc<dyn Operation> {
		Arc::clone(&self.operation)
	}
}

/// A shared document exposing candidate operations.
pub trait Record: Send + Sync {
	fn id(&self) -> &RecordId;

	/// Candidates in display order.
	fn candidates(&self) -> &[Arc<Candidate>];

	/// Number of underlying result entries. Valid logical indices are
	/// `0..result_count()`.
	fn result_count(&self) -> usize;
}

/// Lookup of records by identity.
///
/// Lookup is async so a directory can render or load a record lazily
/// before handing it out.
#[async_trait]
pub trait RecordDirectory: Send + Sync {
	async fn lookup(&self, id: &RecordId) -> Option<Arc<dyn Record>>;
}

/// Plain in-memory record.
#[derive(Debug)]
pub struct MemoryRecord {
	id: RecordId,
	candidates: Vec<Arc<Candidate>>,
	result_count: usize,
}

impl MemoryRecord {
	pub fn new(id: impl Into<RecordId>, result_count: usize) -> Self {
		Self {
			id: id.into(),
			candidates: Vec::new(),
			result_count,
		}
	}

	#[must_use]
	pub fn with_candidate(mut self, candidate: Candidate) -> Self {
		self.candidates.push(Arc::new(candidate));
		self
	}
}

impl Record for MemoryRecord {
	fn id(&self) -> &RecordId {
		&self.id
	}

	fn candidates(&self) -> &[Arc<Candidate>] {
		&self.candidates
	}

	fn result_count(&self) -> usize {
		self.result_count
	}
}

/// In-memory record directory.
#[derive(Default, Clone)]
pub struct MemoryDirectory {
	records: Arc<RwLock<HashMap<RecordId, Arc<dyn Record>>>>,
}

impl MemoryDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, record: impl Record + 'static) -> Arc<dyn Record> {
		let record: Arc<dyn Record> = Arc::new(record);
		self.records.write().insert(record.id().clone(), Arc::clone(&record));
		record
	}

	pub fn remove(&self, id: &RecordId) -> bool {
		self.records.write().remove(id).is_some()
	}
}

#[async_trait]
impl RecordDirectory for MemoryDirectory {
	async fn lookup(&self, id: &RecordId) -> Option<Arc<dyn Record>> {
		self.records.read().get(id).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_set_support_and_fallback() {
		assert!(KindSet::DAMAGE.supports(ActionKind::Half));
		assert!(!KindSet::DAMAGE.supports(ActionKind::Healing));
		assert_eq!(KindSet::HEALING.first(), Some(ActionKind::Healing));
		assert_eq!(KindSet::empty().first(), None);

		let set: KindSet = [ActionKind::Double, ActionKind::Healing].into_iter().collect();
		assert_eq!(set.first(), Some(ActionKind::Double));
	}

	#[test]
	fn numeric_index_parses_only_numbers() {
		let op = operation_fn(|_| Ok(()));
		let c = Candidate::new("Damage", KindSet::DAMAGE, Arc::clone(&op)).with_logical_index(" 2 ");
		assert_eq!(c.numeric_index(), Some(2));

		let c = Candidate::new("Damage", KindSet::DAMAGE, Arc::clone(&op)).with_logical_index("splash");
		assert_eq!(c.numeric_index(), None);
		assert_eq!(c.logical_index().as_deref(), Some("splash"));

		let c = Candidate::new("Damage", KindSet::DAMAGE, op);
		assert_eq!(c.numeric_index(), None);
		c.set_logical_index(1);
		assert_eq!(c.logical_index().as_deref(), Some("1"));
	}

	#[tokio::test]
	async fn memory_directory_lookup() {
		let dir = MemoryDirectory::new();
		dir.insert(MemoryRecord::new("card-1", 1));
		assert!(dir.lookup(&RecordId::new("card-1")).await.is_some());
		assert!(dir.lookup(&RecordId::new("card-2")).await.is_none());
		assert!(dir.remove(&RecordId::new("card-1")));
		assert!(dir.lookup(&RecordId::new("card-1")).await.is_none());
	}
}
