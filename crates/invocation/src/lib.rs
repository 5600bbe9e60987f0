//! Canonical action request types for Herald.
//!
//! Every entry point (a local click on the authority, a remote client going
//! through a transport) converts a user request into an [`ActionRequest`]
//! before it reaches the authority. Requests are immutable once built and are
//! deduplicated by their nonce via [`NonceCache`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod envelope;
mod nonce;
pub mod schema;


pub use envelope::{EnvelopeError, decode_envelope, encode_envelope};
pub use nonce::{DEFAULT_NONCE_CAPACITY, MAX_NONCE_CAPACITY, NonceCache};

/// Stable identity of a shared record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for RecordId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for RecordId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// How the effect of an operation is scaled when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionKind {
	#[default]
	#[serde(alias = "full")]
	Full,
	#[serde(alias = "half")]
	Half,
	#[serde(alias = "double")]
	Double,
	#[serde(alias = "healing")]
	Healing,
}

impl ActionKind {
	pub const ALL: [ActionKind; 4] = [Self::Full, Self::Half, Self::Double, Self::Healing];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Full => "full",
			Self::Half => "half",
			Self::Double => "double",
			Self::Healing => "healing",
		}
	}

	/// Scale factor the underlying operation applies for this kind.
	///
	/// Healing is expressed as a negative full application.
	pub const fn multiplier(self) -> f64 {
		match self {
			Self::Full => 1.0,
			Self::Half => 0.5,
			Self::Double => 2.0,
			Self::Healing => -1.0,
		}
	}
}

impl fmt::Display for ActionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Abstract description of which candidate operation a request wants.
///
/// Every field is optional. Absent fields fall through to the next step of
/// the resolution order on the authority side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Selector {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ordinal: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logical_index: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl Selector {
	pub fn ordinal(ordinal: i64) -> Self {
		Self {
			ordinal: Some(ordinal),
			..Self::default()
		}
	}

	pub fn logical_index(index: impl Into<String>) -> Self {
		Self {
			logical_index: Some(index.into()),
			..Self::default()
		}
	}

	pub fn label(label: impl Into<String>) -> Self {
		Self {
			label: Some(label.into()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	#[must_use]
	pub fn with_logical_index(mut self, index: impl Into<String>) -> Self {
		self.logical_index = Some(index.into());
		self
	}

	/// Returns the ordinal when it can address a list position at all.
	pub fn position(&self) -> Option<usize> {
		self.ordinal.and_then(|o| usize::try_from(o).ok())
	}

	pub fn is_empty(&self) -> bool {
		self.ordinal.is_none() && self.logical_index.is_none() && self.label.is_none()
	}

	/// Short description for tracing/logging.
	pub fn describe(&self) -> String {
		let mut parts = Vec::with_capacity(3);
		if let Some(o) = self.ordinal {
			parts.push(format!("ordinal={o}"));
		}
		if let Some(i) = &self.logical_index {
			parts.push(format!("index={i}"));
		}
		if let Some(l) = &self.label {
			parts.push(format!("label={l}"));
		}
		if parts.is_empty() { "last".to_string() } else { parts.join(",") }
	}
}

/// A request to perform one operation of a record against a set of targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
	request_id: String,
	record_id: RecordId,
	#[serde(default)]
	selector: Selector,
	#[serde(default)]
	action_kind: ActionKind,
	#[serde(default)]
	block_flag: bool,
	#[serde(default)]
	target_refs: Vec<String>,
	#[serde(default = "chrono::Utc::now")]
	issued_at: DateTime<Utc>,
}

impl ActionRequest {
	/// Creates a request with a fresh random nonce issued now.
	pub fn new(record_id: impl Into<RecordId>, selector: Selector, action_kind: ActionKind, target_refs: Vec<String>) -> Self {
		Self {
			request_id: uuid::Uuid::new_v4().to_string(),
			record_id: record_id.into(),
			selector,
			action_kind,
			block_flag: false,
			target_refs,
			issued_at: Utc::now(),
		}
	}

	#[must_use]
	pub fn with_block(mut self, block: bool) -> Self {
		self.block_flag = block;
		self
	}

	/// Replaces the generated nonce, e.g. when replaying a stored envelope.
	#[must_use]
	pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = request_id.into();
		self
	}

	#[must_use]
	pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
		self.issued_at = issued_at;
		self
	}

	pub fn request_id(&self) -> &str {
		&self.request_id
	}

	pub fn record_id(&self) -> &RecordId {
		&self.record_id
	}

	pub fn selector(&self) -> &Selector {
		&self.selector
	}

	pub fn action_kind(&self) -> ActionKind {
		self.action_kind
	}

	pub fn block_flag(&self) -> bool {
		self.block_flag
	}

	pub fn target_refs(&self) -> &[String] {
		&self.target_refs
	}

	pub fn issued_at(&self) -> DateTime<Utc> {
		self.issued_at
	}

	/// Short description for tracing/logging.
	pub fn describe(&self) -> String {
		let block = if self.block_flag { "+block" } else { "" };
		format!(
			"{}{block}:{}[{}] -> {} target(s)",
			self.action_kind,
			self.record_id,
			self.selector.describe(),
			self.target_refs.len()
		)
	}
}
