//! Error types for routing and executing action requests.

use std::path::PathBuf;

use herald_invocation::{EnvelopeError, RecordId};
use thiserror::Error;

/// Failure of one routed request on the authority.
///
/// All variants are handled at the job boundary. Only
/// [`RouteError::NoResolvableTargets`] and [`RouteError::InvocationFailure`]
/// produce user-facing notices; the rest are diagnostic only.
#[derive(Debug, Error)]
pub enum RouteError {
	/// The referenced record could not be found.
	#[error("record {0} not found")]
	UnresolvedRecord(RecordId),

	/// None of the request's target references resolved to a live entity.
	#[error("none of {0} target reference(s) resolved")]
	NoResolvableTargets(usize),

	/// The record exposes no candidate operation at all.
	#[error("record {0} has no candidate operations")]
	NoMatchingOperation(RecordId),

	/// The resolved operation failed or panicked while being invoked.
	#[error("operation invocation failed: {0:#}")]
	InvocationFailure(anyhow::Error),

	/// The inbound envelope could not be decoded.
	#[error(transparent)]
	Envelope(#[from] EnvelopeError),

	/// The authority has been disposed.
	#[error("authority is shut down")]
	Closed,
}

impl RouteError {
	/// Stable short name used in structured logs.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::UnresolvedRecord(_) => "unresolved_record",
			Self::NoResolvableTargets(_) => "no_resolvable_targets",
			Self::NoMatchingOperation(_) => "no_matching_operation",
			Self::InvocationFailure(_) => "invocation_failure",
			Self::Envelope(_) => "envelope",
			Self::Closed => "closed",
		}
	}
}

/// Failure while building or routing a request on the client side.
#[derive(Debug, Error)]
pub enum ClientError {
	/// No target was selected and no self-target fallback applied.
	#[error("no targets selected")]
	NoTargets,

	/// The row already has a request in flight.
	#[error("row {row} of record {record_id} is already handled")]
	RowBusy { record_id: RecordId, row: String },

	/// The local authority rejected the request.
	#[error(transparent)]
	Route(#[from] RouteError),

	#[error(transparent)]
	Envelope(#[from] EnvelopeError),

	/// The transport failed to deliver the envelope.
	#[error("transport failed: {0:#}")]
	Transport(anyhow::Error),
}

/// Errors that can occur when loading router configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or an unknown key.
	#[error("config parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The nonce cache ceiling is too small to compact, or absurdly large.
	#[error("nonce_capacity must be between 2 and {max}, got {0}", max = herald_invocation::MAX_NONCE_CAPACITY)]
	NonceCapacity(usize),

	/// A timing value is out of range.
	#[error("timing `{name}` must be greater than zero")]
	ZeroTiming { name: &'static str },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
