//! Time-boxed interception of downstream notifications.
//!
//! A window discards every notification matching its predicate until it is
//! closed, either explicitly or by its own expiry timer. Matching also
//! requires the notification to arrive within the window's duration, so a
//! late expiry timer never widens the window.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use herald_worker::{TaskClass, spawn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::notify::Notification;

type Predicate = Box<dyn Fn(&Notification) -> bool + Send + Sync>;

/// Handle returned by [`SuppressionWindows::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(u64);

struct Window {
	predicate: Predicate,
	opened_at: Instant,
	duration: Duration,
	discarded: usize,
	expiry: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct WindowsState {
	next: u64,
	open: HashMap<u64, Window>,
}

/// Registry of open suppression windows.
#[derive(Clone, Default)]
pub struct SuppressionWindows {
	state: Arc<Mutex<WindowsState>>,
}

impl std::fmt::Debug for SuppressionWindows {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SuppressionWindows").field("open", &self.open_count()).finish()
	}
}

impl SuppressionWindows {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens a window that self-closes after `duration`.
	pub fn open(&self, predicate: impl Fn(&Notification) -> bool + Send + Sync + 'static, duration: Duration) -> WindowHandle {
		let mut state = self.state.lock();
		state.next += 1;
		let id = state.next;

		let weak: Weak<Mutex<WindowsState>> = Arc::downgrade(&self.state);
		let expiry = spawn(TaskClass::Background, async move {
			tokio::time::sleep(duration).await;
			if let Some(state) = weak.upgrade() {
				let window = state.lock().open.remove(&id);
				if let Some(window) = window {
					tracing::debug!(window = id, discarded = window.discarded, "suppression.expired");
				}
			}
		});

		state.open.insert(
			id,
			Window {
				predicate: Box::new(predicate),
				opened_at: Instant::now(),
				duration,
				discarded: 0,
				expiry: Some(expiry),
			},
		);
		tracing::debug!(window = id, duration_ms = duration.as_millis() as u64, "suppression.opened");
		WindowHandle(id)
	}

	/// Closes a window early. Returns `false` if it already closed.
	pub fn close(&self, handle: WindowHandle) -> bool {
		let window = self.state.lock().open.remove(&handle.0);
		match window {
			Some(mut window) => {
				if let Some(expiry) = window.expiry.take() {
					expiry.abort();
				}
				tracing::debug!(window = handle.0, discarded = window.discarded, "suppression.closed");
				true
			}
			None => false,
		}
	}

	/// Closes every open window. Returns how many were open.
	pub fn close_all(&self) -> usize {
		let windows: Vec<Window> = self.state.lock().open.drain().map(|(_, w)| w).collect();
		for window in &windows {
			if let Some(expiry) = &window.expiry {
				expiry.abort();
			}
		}
		windows.len()
	}

	pub fn is_open(&self, handle: WindowHandle) -> bool {
		self.state.lock().open.contains_key(&handle.0)
	}

	pub fn open_count(&self) -> usize {
		self.state.lock().open.len()
	}

	/// Returns `true` if some live window claims (and discards) `notification`.
	pub fn intercept(&self, notification: &Notification) -> bool {
		let now = Instant::now();
		let mut state = self.state.lock();
		for (id, window) in state.open.iter_mut() {
			if now.duration_since(window.opened_at) < window.duration && (window.predicate)(notification) {
				window.discarded += 1;
				tracing::debug!(window = *id, kind = ?notification.kind, "suppression.discarded");
				return true;
			}
		}
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notify::NotificationKind;

	fn is_feedback(n: &Notification) -> bool {
		n.kind == NotificationKind::Feedback
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn discards_matches_only_inside_the_window() {
		let windows = SuppressionWindows::new();
		windows.open(is_feedback, Duration::from_millis(1500));

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert!(windows.intercept(&Notification::feedback("Amiri takes 7 damage")));
		assert!(!windows.intercept(&Notification::summary("applied")), "non-matching passes through");

		tokio::time::sleep(Duration::from_millis(1500)).await;
		assert!(!windows.intercept(&Notification::feedback("Amiri takes 7 damage")));
		assert_eq!(windows.open_count(), 0, "window self-closed");
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn close_early_stops_interception() {
		let windows = SuppressionWindows::new();
		let handle = windows.open(is_feedback, Duration::from_secs(10));

		assert!(windows.is_open(handle));
		assert!(windows.close(handle));
		assert!(!windows.close(handle), "second close is a no-op");
		assert!(!windows.intercept(&Notification::feedback("late")));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn close_all_unregisters_everything() {
		let windows = SuppressionWindows::new();
		windows.open(is_feedback, Duration::from_secs(10));
		windows.open(|_| true, Duration::from_secs(10));

		assert_eq!(windows.close_all(), 2);
		assert_eq!(windows.open_count(), 0);
		assert_eq!(windows.close_all(), 0);
	}
}
