//! Snapshot, mutate, and restore of the authority's shared targeting state.
//!
//! The selection/target/context triple is a single resource with a single
//! writer: the job currently holding a [`SelectionSnapshot`]. Exclusivity
//! comes from the serialized execution queue, not from locks here.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RouteError;

/// Identity of a live entity on the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for EntityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identity of a spatial/view context (the scene an entity lives in).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(String);

impl ContextId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ContextId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A target reference resolved to a live entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
	pub id: EntityId,
	pub context: ContextId,
	pub name: String,
}

/// The authority's view of shared selection state.
///
/// Implementations wrap whatever owns controlled entities, user targets,
/// and the current view.
#[async_trait]
pub trait TargetingSurface: Send + Sync {
	/// Resolves an opaque target reference to a live entity.
	fn resolve(&self, target_ref: &str) -> Option<Entity>;

	fn current_context(&self) -> Option<ContextId>;

	fn controlled(&self) -> BTreeSet<EntityId>;

	fn targets(&self) -> BTreeSet<EntityId>;

	/// Releases every controlled entity.
	fn release_all(&self);

	/// Takes control of one entity without releasing others. Returns `false`
	/// if the entity no longer exists.
	fn control(&self, id: &EntityId) -> bool;

	/// Replaces the target set.
	fn set_targets(&self, targets: BTreeSet<EntityId>);

	/// Switches the current view to `context`.
	async fn view_context(&self, context: &ContextId) -> anyhow::Result<()>;
}

/// State captured immediately before a job mutates shared targeting state.
///
/// Owned by exactly one in-flight job and consumed by
/// [`SelectionManager::release`].
#[derive(Debug)]
#[must_use = "a snapshot must be released to restore the previous selection"]
pub struct SelectionSnapshot {
	context: Option<ContextId>,
	controlled: BTreeSet<EntityId>,
	targets: BTreeSet<EntityId>,
	switched_context: bool,
}

impl SelectionSnapshot {
	pub fn context(&self) -> Option<&ContextId> {
		self.context.as_ref()
	}

	pub fn controlled(&self) -> &BTreeSet<EntityId> {
		&self.controlled
	}

	pub fn targets(&self) -> &BTreeSet<EntityId> {
		&self.targets
	}

	pub fn switched_context(&self) -> bool {
		self.switched_context
	}
}

/// Result of a successful acquire.
#[derive(Debug)]
pub struct Acquired {
	/// Resolved entities, deduplicated, in request order.
	pub live: Vec<Entity>,
	pub snapshot: SelectionSnapshot,
}

/// Takes and gives back exclusive control of shared targeting state.
pub struct SelectionManager {
	surface: Arc<dyn TargetingSurface>,
	view_target_context: bool,
	settle: Duration,
}

impl SelectionManager {
	pub fn new(surface: Arc<dyn TargetingSurface>, view_target_context: bool, settle: Duration) -> Self {
		Self {
			surface,
			view_target_context,
			settle,
		}
	}

	pub fn surface(&self) -> &Arc<dyn TargetingSurface> {
		&self.surface
	}

	/// Resolves `target_refs` and makes them the exact target set.
	///
	/// Unresolvable references are dropped. If nothing resolves, no state is
	/// touched and no snapshot is taken.
	pub async fn acquire(&self, target_refs: &[String]) -> Result<Acquired, RouteError> {
		let mut seen = BTreeSet::new();
		let live: Vec<Entity> = target_refs
			.iter()
			.filter_map(|r| {
				let entity = self.surface.resolve(r);
				if entity.is_none() {
					tracing::debug!(target_ref = %r, "selection.unresolved_ref");
				}
				entity
			})
			.filter(|e| seen.insert(e.id.clone()))
			.collect();

		if live.is_empty() {
			tracing::warn!(refs = target_refs.len(), "selection.no_resolvable_targets");
			return Err(RouteError::NoResolvableTargets(target_refs.len()));
		}

		let mut snapshot = SelectionSnapshot {
			context: self.surface.current_context(),
			controlled: self.surface.controlled(),
			targets: self.surface.targets(),
			switched_context: false,
		};

		let target_context = &live[0].context;
		if self.view_target_context && snapshot.context.as_ref() != Some(target_context) {
			match self.surface.view_context(target_context).await {
				Ok(()) => {
					snapshot.switched_context = true;
					tracing::debug!(from = ?snapshot.context, to = %target_context, "selection.context_switched");
					tokio::time::sleep(self.settle).await;
				}
				Err(err) => tracing::warn!(context = %target_context, error = %err, "selection.context_switch_failed"),
			}
		}

		let ids: BTreeSet<EntityId> = live.iter().map(|e| e.id.clone()).collect();
		self.surface.release_all();
		self.surface.set_targets(BTreeSet::new());
		self.surface.set_targets(ids);

		tracing::debug!(
			count = live.len(),
			names = ?live.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
			"selection.acquired"
		);
		Ok(Acquired { live, snapshot })
	}

	/// Restores the state captured by [`Self::acquire`].
	///
	/// Previously controlled entities that no longer exist are skipped.
	pub async fn release(&self, snapshot: SelectionSnapshot) {
		self.surface.release_all();

		let mut skipped = 0usize;
		for id in &snapshot.controlled {
			if !self.surface.control(id) {
				skipped += 1;
			}
		}
		if skipped > 0 {
			tracing::debug!(skipped, "selection.controlled_missing");
		}

		self.surface.set_targets(snapshot.targets);

		if snapshot.switched_context
			&& let Some(previous) = snapshot.context
			&& self.surface.current_context().as_ref() != Some(&previous)
			&& let Err(err) = self.surface.view_context(&previous).await
		{
			tracing::warn!(context = %previous, error = %err, "selection.context_restore_failed");
		}

		tracing::debug!("selection.restored");
	}
}
