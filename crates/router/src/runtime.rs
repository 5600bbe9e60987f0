//! Process-wide authority slot.
//!
//! Hosts that reload the router in place call [`init`] on every load;
//! the previous authority is disposed before the new one is installed.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::authority::Authority;

static CURRENT: RwLock<Option<Arc<Authority>>> = parking_lot::const_rwlock(None);

/// Installs `authority` as the process-wide instance.
pub fn init(authority: Arc<Authority>) {
	let previous = CURRENT.write().replace(authority);
	if let Some(previous) = previous {
		tracing::info!(authority = previous.id(), "runtime.replaced");
		previous.dispose();
	}
}

pub fn current() -> Option<Arc<Authority>> {
	CURRENT.read().clone()
}

/// Disposes and clears the installed authority.
///
/// Safe to call before [`init`] and more than once. Returns `false` when
/// nothing was installed.
pub fn dispose() -> bool {
	let Some(authority) = CURRENT.write().take() else {
		return false;
	};
	authority.dispose();
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::RouterConfig;
	use crate::memory::{MemorySurface, NotificationCenter};
	use crate::record::MemoryDirectory;
	use crate::selection::ContextId;

	fn authority(id: &str) -> Arc<Authority> {
		Authority::new(
			id,
			RouterConfig::default(),
			Arc::new(MemoryDirectory::new()),
			Arc::new(MemorySurface::new(ContextId::new("scene-1"))),
			Arc::new(NotificationCenter::new()),
		)
	}

	#[test]
	fn lifecycle() {
		assert!(!dispose(), "dispose before init is a no-op");
		assert!(current().is_none());

		let first = authority("gm-1");
		init(Arc::clone(&first));
		assert_eq!(current().map(|a| a.id().to_string()).as_deref(), Some("gm-1"));

		init(authority("gm-2"));
		assert!(first.is_disposed(), "reload disposes the previous instance");
		assert_eq!(current().map(|a| a.id().to_string()).as_deref(), Some("gm-2"));

		assert!(dispose());
		assert!(!dispose());
		assert!(current().is_none());
	}
}
