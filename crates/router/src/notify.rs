//! Notifications the authority publishes downstream.

use std::fmt;
use std::sync::{Arc, LazyLock};

use herald_invocation::{ActionKind, RecordId};
use regex::Regex;

use crate::suppression::SuppressionWindows;

/// Feedback an operation posts about its own effect, matched by content when
/// the producer did not tag it.
static OPERATION_FEEDBACK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)damage\s*taken|healing").expect("feedback pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
	/// Per-target feedback produced by an operation.
	Feedback,
	/// Router-authored summary of an applied request.
	Summary,
	Warning,
	Error,
	Info,
}

impl NotificationKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Feedback => "feedback",
			Self::Summary => "summary",
			Self::Warning => "warning",
			Self::Error => "error",
			Self::Info => "info",
		}
	}
}

/// A message headed for the shared log or a user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub kind: NotificationKind,
	pub content: String,
	pub record_id: Option<RecordId>,
	/// Who produced the notification, if known.
	pub origin: Option<String>,
}

impl Notification {
	pub fn new(kind: NotificationKind, content: impl Into<String>) -> Self {
		Self {
			kind,
			content: content.into(),
			record_id: None,
			origin: None,
		}
	}

	pub fn feedback(content: impl Into<String>) -> Self {
		Self::new(NotificationKind::Feedback, content)
	}

	pub fn summary(content: impl Into<String>) -> Self {
		Self::new(NotificationKind::Summary, content)
	}

	pub fn warning(content: impl Into<String>) -> Self {
		Self::new(NotificationKind::Warning, content)
	}

	pub fn error(content: impl Into<String>) -> Self {
		Self::new(NotificationKind::Error, content)
	}

	pub fn info(content: impl Into<String>) -> Self {
		Self::new(NotificationKind::Info, content)
	}

	#[must_use]
	pub fn with_record(mut self, record_id: RecordId) -> Self {
		self.record_id = Some(record_id);
		self
	}

	#[must_use]
	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = Some(origin.into());
		self
	}

	/// Whether this looks like feedback an operation posts about its own effect.
	pub fn is_operation_feedback(&self) -> bool {
		self.kind == NotificationKind::Feedback || OPERATION_FEEDBACK.is_match(&self.content)
	}
}

/// Final destination of published notifications.
pub trait NotificationSink: Send + Sync {
	fn deliver(&self, notification: Notification);
}

/// Outcome of [`NotificationBus::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	Delivered,
	/// An open suppression window claimed the notification.
	Discarded,
}

/// Routes notifications through the open suppression windows to a sink.
///
/// Operations that post their own feedback should publish through the bus so
/// suppression applies to them.
#[derive(Clone)]
pub struct NotificationBus {
	sink: Arc<dyn NotificationSink>,
	windows: SuppressionWindows,
}

impl fmt::Debug for NotificationBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NotificationBus").field("windows", &self.windows).finish_non_exhaustive()
	}
}

impl NotificationBus {
	pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
		Self {
			sink,
			windows: SuppressionWindows::new(),
		}
	}

	pub fn publish(&self, notification: Notification) -> Delivery {
		if self.windows.intercept(&notification) {
			return Delivery::Discarded;
		}
		tracing::trace!(kind = notification.kind.as_str(), "notify.delivered");
		self.sink.deliver(notification);
		Delivery::Delivered
	}

	pub fn windows(&self) -> &SuppressionWindows {
		&self.windows
	}
}

/// One-line recap of an applied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
	pub record_id: RecordId,
	pub kind: ActionKind,
	pub block: bool,
	pub target_count: usize,
	pub logical_index: Option<usize>,
}

impl fmt::Display for ApplySummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Herald: {}", self.kind)?;
		if self.block {
			f.write_str(" [Block]")?;
		}
		write!(f, " from record {}", self.record_id)?;
		if let Some(index) = self.logical_index {
			write!(f, " (index {index})")?;
		}
		write!(f, " to {} target(s).", self.target_count)
	}
}

impl ApplySummary {
	pub fn to_notification(&self) -> Notification {
		Notification::summary(self.to_string()).with_record(self.record_id.clone())
	}
}
