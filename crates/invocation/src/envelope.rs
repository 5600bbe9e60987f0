use thiserror::Error;

use crate::{ActionRequest, schema};

/// Errors produced while decoding or encoding a request envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
	/// The payload is not a valid envelope object.
	#[error("malformed envelope: {0}")]
	Malformed(#[from] serde_json::Error),

	/// A required field is present but empty.
	#[error("envelope field `{0}` must not be empty")]
	EmptyField(&'static str),
}

/// Decodes one inbound envelope.
///
/// Missing optional fields (selector members, kind, block flag, targets,
/// issue time) take their defaults. The nonce and record id are required and
/// must be non-empty, since deduplication and record lookup depend on them.
pub fn decode_envelope(json: &str) -> Result<ActionRequest, EnvelopeError> {
	let request: ActionRequest = serde_json::from_str(json)?;
	if request.request_id().is_empty() {
		return Err(EnvelopeError::EmptyField(schema::REQUEST_ID));
	}
	if request.record_id().as_str().is_empty() {
		return Err(EnvelopeError::EmptyField(schema::RECORD_ID));
	}
	tracing::trace!(request_id = request.request_id(), "envelope.decode");
	Ok(request)
}

/// Encodes a request for delivery through a transport.
pub fn encode_envelope(request: &ActionRequest) -> Result<String, EnvelopeError> {
	Ok(serde_json::to_string(request)?)
}
