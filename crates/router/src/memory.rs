//! In-memory collaborators for embedding and tests.

use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::notify::{Notification, NotificationSink};
use crate::selection::{ContextId, Entity, EntityId, TargetingSurface};

#[derive(Debug, Default)]
struct SurfaceState {
	entities: HashMap<EntityId, Entity>,
	context: Option<ContextId>,
	controlled: BTreeSet<EntityId>,
	targets: BTreeSet<EntityId>,
	context_switches: usize,
}

/// Targeting surface backed by plain collections.
///
/// Target references are entity ids.
#[derive(Debug, Default)]
pub struct MemorySurface {
	state: Mutex<SurfaceState>,
}

impl MemorySurface {
	pub fn new(context: ContextId) -> Self {
		Self {
			state: Mutex::new(SurfaceState {
				context: Some(context),
				..SurfaceState::default()
			}),
		}
	}

	pub fn add_entity(&self, id: &str, context: &str, name: &str) {
		let entity = Entity {
			id: EntityId::new(id),
			context: ContextId::new(context),
			name: name.to_string(),
		};
		self.state.lock().entities.insert(entity.id.clone(), entity);
	}

	/// Removes an entity as if it was deleted from its context.
	pub fn remove_entity(&self, id: &str) {
		let id = EntityId::new(id);
		let mut state = self.state.lock();
		state.entities.remove(&id);
		state.controlled.remove(&id);
		state.targets.remove(&id);
	}

	/// Number of successful view switches so far.
	pub fn context_switches(&self) -> usize {
		self.state.lock().context_switches
	}
}

#[async_trait]
impl TargetingSurface for MemorySurface {
	fn resolve(&self, target_ref: &str) -> Option<Entity> {
		self.state.lock().entities.get(&EntityId::new(target_ref)).cloned()
	}

	fn current_context(&self) -> Option<ContextId> {
		self.state.lock().context.clone()
	}

	fn controlled(&self) -> BTreeSet<EntityId> {
		self.state.lock().controlled.clone()
	}

	fn targets(&self) -> BTreeSet<EntityId> {
		self.state.lock().targets.clone()
	}

	fn release_all(&self) {
		self.state.lock().controlled.clear();
	}

	fn control(&self, id: &EntityId) -> bool {
		let mut state = self.state.lock();
		if !state.entities.contains_key(id) {
			return false;
		}
		state.controlled.insert(id.clone());
		true
	}

	fn set_targets(&self, targets: BTreeSet<EntityId>) {
		self.state.lock().targets = targets;
	}

	async fn view_context(&self, context: &ContextId) -> anyhow::Result<()> {
		let mut state = self.state.lock();
		state.context = Some(context.clone());
		state.context_switches += 1;
		Ok(())
	}
}

/// Notification sink that queues deliveries for a presentation layer.
#[derive(Debug, Default)]
pub struct NotificationCenter {
	pending: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.lock().is_empty()
	}

	pub fn len(&self) -> usize {
		self.pending.lock().len()
	}

	pub fn take_pending(&self) -> Vec<Notification> {
		self.pending.lock().drain(..).collect()
	}
}

impl NotificationSink for NotificationCenter {
	fn deliver(&self, notification: Notification) {
		self.pending.lock().push_back(notification);
	}
}
