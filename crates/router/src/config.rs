//! Router configuration.
//!
//! All fields are defaulted, so an empty document yields [`RouterConfig::default`].
//! Timings are fixed per authority and never vary per request.
//!
//! ```toml
//! post_summary = true
//! suppress_feedback = true
//!
//! [timings]
//! release_ms = 350
//! ```

use std::path::Path;
use std::time::Duration;

use herald_invocation::{DEFAULT_NONCE_CAPACITY, MAX_NONCE_CAPACITY};
use herald_worker::QueueConfig;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Authority behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
	/// Verbose logging (detection, payloads, selection, apply flow).
	pub debug: bool,
	/// Hide the generic "apply failed" notice on the authority.
	pub suppress_failure_notice: bool,
	/// Post a one-line summary after each successful job.
	pub post_summary: bool,
	/// Temporarily view the targets' context while applying.
	pub view_target_context: bool,
	/// Discard the operation's own feedback notifications after applying.
	pub suppress_feedback: bool,
	/// Run jobs one at a time in arrival order.
	pub serialize: bool,
	/// Nonce cache ceiling before compaction to half.
	pub nonce_capacity: usize,
	pub timings: Timings,
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			debug: false,
			suppress_failure_notice: true,
			post_summary: false,
			view_target_context: true,
			suppress_feedback: false,
			serialize: true,
			nonce_capacity: DEFAULT_NONCE_CAPACITY,
			timings: Timings::default(),
		}
	}
}

/// Fixed delays, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timings {
	/// Wait after switching context before touching selection.
	pub settle_ms: u64,
	/// Wait after invoking before restoring selection.
	pub release_ms: u64,
	/// Wait between two serialized jobs.
	pub pacing_ms: u64,
	/// Lifetime of a feedback suppression window.
	pub suppression_ms: u64,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			settle_ms: 120,
			release_ms: 350,
			pacing_ms: 150,
			suppression_ms: 1500,
		}
	}
}

impl Timings {
	/// Settle, release, and pacing set to zero. The suppression window stays
	/// at 1ms because a zero window is rejected by validation.
	pub const fn immediate() -> Self {
		Self {
			settle_ms: 0,
			release_ms: 0,
			pacing_ms: 0,
			suppression_ms: 1,
		}
	}

	pub const fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}

	pub const fn release(&self) -> Duration {
		Duration::from_millis(self.release_ms)
	}

	pub const fn pacing(&self) -> Duration {
		Duration::from_millis(self.pacing_ms)
	}

	pub const fn suppression(&self) -> Duration {
		Duration::from_millis(self.suppression_ms)
	}
}

impl RouterConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses, and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Rejects a nonce ceiling outside `2..=MAX_NONCE_CAPACITY` and a zero
	/// suppression window.
	pub fn validate(&self) -> Result<()> {
		if !(2..=MAX_NONCE_CAPACITY).contains(&self.nonce_capacity) {
			return Err(ConfigError::NonceCapacity(self.nonce_capacity));
		}
		if self.timings.suppression_ms == 0 {
			return Err(ConfigError::ZeroTiming { name: "suppression_ms" });
		}
		Ok(())
	}

	/// Queue settings derived from this config.
	pub fn queue_config(&self) -> QueueConfig {
		QueueConfig {
			serialize: self.serialize,
			pacing: self.timings.pacing(),
			..QueueConfig::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_is_default() {
		assert_eq!(RouterConfig::from_toml_str("").expect("valid"), RouterConfig::default());
	}

	#[test]
	fn partial_document_overrides_only_given_keys() {
		let config = RouterConfig::from_toml_str(
			r#"
post_summary = true
serialize = false

[timings]
release_ms = 500
"#,
		)
		.expect("valid");

		assert!(config.post_summary);
		assert!(!config.serialize);
		assert!(config.suppress_failure_notice);
		assert_eq!(config.timings.release(), Duration::from_millis(500));
		assert_eq!(config.timings.settle(), Duration::from_millis(120));
		assert!(!config.queue_config().serialize);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = RouterConfig::from_toml_str("post_sumary = true").expect_err("typo should fail");
		assert!(matches!(err, ConfigError::Toml(_)), "got: {err}");
	}

	#[test]
	fn invalid_values_are_rejected() {
		let err = RouterConfig::from_toml_str("nonce_capacity = 1").expect_err("too small");
		assert!(matches!(err, ConfigError::NonceCapacity(1)));

		let err = RouterConfig::from_toml_str("nonce_capacity = 100000000000").expect_err("too large");
		assert!(matches!(err, ConfigError::NonceCapacity(100_000_000_000)), "got: {err}");
		assert!(RouterConfig::from_toml_str(&format!("nonce_capacity = {MAX_NONCE_CAPACITY}")).is_ok());

		let err = RouterConfig::from_toml_str("[timings]\nsuppression_ms = 0").expect_err("zero window");
		assert!(matches!(err, ConfigError::ZeroTiming { name: "suppression_ms" }));
	}

	#[test]
	fn missing_file_reports_path() {
		let err = RouterConfig::load("/nonexistent/herald.toml").expect_err("missing file");
		assert!(err.to_string().contains("/nonexistent/herald.toml"), "got: {err}");
	}
}
