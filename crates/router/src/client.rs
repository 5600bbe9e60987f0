//! Client-side entry point: builds requests and routes them to the authority.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use herald_invocation::{ActionKind, ActionRequest, RecordId, Selector, encode_envelope};
use parking_lot::Mutex;

use crate::authority::{Authority, Pong, Submission};
use crate::error::ClientError;

/// Delivery of envelopes from a remote client to the authority.
///
/// Treated as at-least-once; the authority deduplicates by nonce.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send_to_authority(&self, envelope: String) -> anyhow::Result<()>;

	async fn ping(&self, from: &str) -> anyhow::Result<Pong>;
}

/// Source of a default target for healing requests submitted with none.
pub trait SelfTargetSource: Send + Sync {
	/// Target reference of whoever authored the record, if it still exists.
	fn speaker_target(&self, record_id: &RecordId) -> Option<String>;

	/// Target reference of this client's own character in the current context.
	fn own_character_target(&self) -> Option<String>;
}

enum Route {
	/// This client is the authority.
	Local(Arc<Authority>),
	Remote(Arc<dyn Transport>),
}

/// One row of a rendered record, keyed by its selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
	record_id: RecordId,
	row: String,
}

impl fmt::Display for RowKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.record_id, self.row)
	}
}

/// Builds [`ActionRequest`]s and hands them to the authority.
///
/// Tracks which records have been wired to this client and which rows have a
/// submission in flight, so a double click on a row sends once.
pub struct ClientRouter {
	client_id: String,
	route: Route,
	self_targets: Option<Arc<dyn SelfTargetSource>>,
	wired: Mutex<HashSet<RecordId>>,
	busy: Mutex<HashSet<RowKey>>,
}

impl fmt::Debug for ClientRouter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientRouter")
			.field("client_id", &self.client_id)
			.field("local", &self.is_authority())
			.field("wired", &self.wired.lock().len())
			.field("busy", &self.busy.lock().len())
			.finish_non_exhaustive()
	}
}

impl ClientRouter {
	/// Router for the peer that is itself the authority.
	pub fn local(client_id: impl Into<String>, authority: Arc<Authority>) -> Self {
		Self::with_route(client_id.into(), Route::Local(authority))
	}

	/// Router for a peer that reaches the authority through `transport`.
	pub fn remote(client_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
		Self::with_route(client_id.into(), Route::Remote(transport))
	}

	fn with_route(client_id: String, route: Route) -> Self {
		Self {
			client_id,
			route,
			self_targets: None,
			wired: Mutex::new(HashSet::new()),
			busy: Mutex::new(HashSet::new()),
		}
	}

	#[must_use]
	pub fn with_self_targets(mut self, source: Arc<dyn SelfTargetSource>) -> Self {
		self.self_targets = Some(source);
		self
	}

	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	pub fn is_authority(&self) -> bool {
		matches!(self.route, Route::Local(_))
	}

	/// Registers a rendered record. Returns `false` if it was already wired.
	pub fn wire(&self, record_id: &RecordId) -> bool {
		let added = self.wired.lock().insert(record_id.clone());
		if added {
			tracing::debug!(record_id = %record_id, "client.wired");
		}
		added
	}

	/// Forgets a record and every busy row it had.
	pub fn unwire(&self, record_id: &RecordId) -> bool {
		self.busy.lock().retain(|key| &key.record_id != record_id);
		self.wired.lock().remove(record_id)
	}

	pub fn is_wired(&self, record_id: &RecordId) -> bool {
		self.wired.lock().contains(record_id)
	}

	pub fn is_row_busy(&self, record_id: &RecordId, selector: &Selector) -> bool {
		self.busy.lock().contains(&row_key(record_id, selector))
	}

	/// Makes a row submittable again. Returns `false` if it was not busy.
	pub fn reset_row(&self, record_id: &RecordId, selector: &Selector) -> bool {
		self.busy.lock().remove(&row_key(record_id, selector))
	}

	/// Builds a request for one row and routes it to the authority.
	///
	/// Empty `target_refs` on a healing request fall back to a self-target.
	/// The row stays busy after a send attempt and is only released again
	/// when nothing could be targeted. Returns the request's nonce.
	pub async fn submit(
		&self,
		record_id: &RecordId,
		selector: Selector,
		kind: ActionKind,
		block: bool,
		mut target_refs: Vec<String>,
	) -> Result<String, ClientError> {
		let key = row_key(record_id, &selector);
		if !self.busy.lock().insert(key.clone()) {
			tracing::warn!(row = %key, "client.row_busy");
			return Err(ClientError::RowBusy {
				record_id: key.record_id,
				row: key.row,
			});
		}

		if target_refs.is_empty() && kind == ActionKind::Healing {
			target_refs.extend(self.self_target(record_id));
		}
		if target_refs.is_empty() {
			self.busy.lock().remove(&key);
			return Err(ClientError::NoTargets);
		}

		let request = ActionRequest::new(record_id.clone(), selector, kind, target_refs).with_block(block);
		let request_id = request.request_id().to_string();
		tracing::debug!(client = %self.client_id, request = %request.describe(), "client.route");

		match &self.route {
			Route::Local(authority) => {
				if let Submission::Duplicate = authority.submit(request)? {
					tracing::debug!(request_id = %request_id, "client.duplicate");
				}
			}
			Route::Remote(transport) => {
				let envelope = encode_envelope(&request)?;
				transport.send_to_authority(envelope).await.map_err(ClientError::Transport)?;
			}
		}
		Ok(request_id)
	}

	/// Checks that the authority is reachable.
	pub async fn ping(&self) -> Result<Pong, ClientError> {
		match &self.route {
			Route::Local(authority) => Ok(authority.ping(&self.client_id)),
			Route::Remote(transport) => transport.ping(&self.client_id).await.map_err(ClientError::Transport),
		}
	}

	fn self_target(&self, record_id: &RecordId) -> Option<String> {
		let source = self.self_targets.as_ref()?;
		let target = source.speaker_target(record_id).or_else(|| source.own_character_target());
		tracing::debug!(record_id = %record_id, target = ?target, "client.self_target");
		target
	}
}

fn row_key(record_id: &RecordId, selector: &Selector) -> RowKey {
	RowKey {
		record_id: record_id.clone(),
		row: selector.describe(),
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;
	use herald_invocation::decode_envelope;
	use pretty_assertions::assert_eq;

	use super::*;

	#[derive(Default)]
	struct RecordingTransport {
		sent: Mutex<Vec<String>>,
		fail: bool,
	}

	#[async_trait]
	impl Transport for RecordingTransport {
		async fn send_to_authority(&self, envelope: String) -> anyhow::Result<()> {
			if self.fail {
				anyhow::bail!("socket not ready");
			}
			self.sent.lock().push(envelope);
			Ok(())
		}

		async fn ping(&self, from: &str) -> anyhow::Result<Pong> {
			Ok(Pong {
				authority: "gm".into(),
				from: from.into(),
				at: Utc::now(),
			})
		}
	}

	struct Speaker(Option<&'static str>);

	impl SelfTargetSource for Speaker {
		fn speaker_target(&self, _: &RecordId) -> Option<String> {
			self.0.map(str::to_string)
		}

		fn own_character_target(&self) -> Option<String> {
			Some("tok-self".into())
		}
	}

	fn card() -> RecordId {
		RecordId::new("card-42")
	}

	#[tokio::test]
	async fn remote_submit_sends_one_envelope_and_marks_row_busy() {
		let transport = Arc::new(RecordingTransport::default());
		let client = ClientRouter::remote("player-2", transport.clone());

		let id = client
			.submit(&card(), Selector::ordinal(1), ActionKind::Half, true, vec!["tok-A".into(), "tok-B".into()])
			.await
			.expect("sent");

		let sent = transport.sent.lock().clone();
		assert_eq!(sent.len(), 1);
		let decoded = decode_envelope(&sent[0]).expect("valid envelope");
		assert_eq!(decoded.request_id(), id);
		assert_eq!(decoded.action_kind(), ActionKind::Half);
		assert!(decoded.block_flag());
		assert_eq!(decoded.target_refs(), ["tok-A".to_string(), "tok-B".to_string()]);

		let again = client.submit(&card(), Selector::ordinal(1), ActionKind::Half, true, vec!["tok-A".into()]).await;
		assert!(matches!(again, Err(ClientError::RowBusy { .. })));
		assert_eq!(transport.sent.lock().len(), 1);

		assert!(client.reset_row(&card(), &Selector::ordinal(1)));
		client.submit(&card(), Selector::ordinal(1), ActionKind::Full, false, vec!["tok-A".into()]).await.expect("row reset");
	}

	#[tokio::test]
	async fn healing_without_targets_uses_self_target() {
		let transport = Arc::new(RecordingTransport::default());
		let client = ClientRouter::remote("player-2", transport.clone()).with_self_targets(Arc::new(Speaker(None)));

		client.submit(&card(), Selector::ordinal(0), ActionKind::Healing, false, Vec::new()).await.expect("self-targeted");
		let decoded = decode_envelope(&transport.sent.lock()[0]).expect("valid");
		assert_eq!(decoded.target_refs(), ["tok-self".to_string()]);

		let client = ClientRouter::remote("player-2", transport.clone()).with_self_targets(Arc::new(Speaker(Some("tok-speaker"))));
		client.submit(&card(), Selector::ordinal(0), ActionKind::Healing, false, Vec::new()).await.expect("self-targeted");
		let decoded = decode_envelope(&transport.sent.lock()[1]).expect("valid");
		assert_eq!(decoded.target_refs(), ["tok-speaker".to_string()]);
	}

	#[tokio::test]
	async fn no_targets_refuses_locally_and_frees_row() {
		let transport = Arc::new(RecordingTransport::default());
		let client = ClientRouter::remote("player-2", transport.clone());

		let err = client.submit(&card(), Selector::ordinal(0), ActionKind::Full, false, Vec::new()).await;
		assert!(matches!(err, Err(ClientError::NoTargets)));
		assert!(!client.is_row_busy(&card(), &Selector::ordinal(0)));
		assert!(transport.sent.lock().is_empty());

		// Healing without a self-target source is refused the same way.
		let err = client.submit(&card(), Selector::ordinal(0), ActionKind::Healing, false, Vec::new()).await;
		assert!(matches!(err, Err(ClientError::NoTargets)));
	}

	#[tokio::test]
	async fn transport_failure_is_reported() {
		let transport = Arc::new(RecordingTransport {
			fail: true,
			..RecordingTransport::default()
		});
		let client = ClientRouter::remote("player-2", transport);
		let err = client.submit(&card(), Selector::label("Damage"), ActionKind::Full, false, vec!["tok-A".into()]).await;
		assert!(matches!(err, Err(ClientError::Transport(e)) if e.to_string().contains("socket not ready")));
	}

	#[test]
	fn wiring_is_idempotent_and_unwire_clears_busy_rows() {
		let client = ClientRouter::remote("player-2", Arc::new(RecordingTransport::default()));
		assert!(client.wire(&card()));
		assert!(!client.wire(&card()));
		assert!(client.is_wired(&card()));

		client.busy.lock().insert(row_key(&card(), &Selector::ordinal(0)));
		assert!(client.unwire(&card()));
		assert!(!client.is_row_busy(&card(), &Selector::ordinal(0)));
		assert!(!client.unwire(&card()));
	}

	#[tokio::test]
	async fn remote_ping_goes_through_transport() {
		let client = ClientRouter::remote("player-2", Arc::new(RecordingTransport::default()));
		let pong = client.ping().await.expect("reachable");
		assert_eq!(pong.from, "player-2");
		assert!(!client.is_authority());
	}
}
