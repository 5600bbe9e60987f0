use indexmap::IndexSet;

use crate::ActionRequest;

/// Default ceiling before the cache compacts.
pub const DEFAULT_NONCE_CAPACITY: usize = 200;

/// Largest ceiling a router configuration may request.
pub const MAX_NONCE_CAPACITY: usize = 100_000;

/// Bounded set of recently accepted request nonces.
///
/// Used only for membership testing. Once the set grows past its ceiling it
/// is compacted to the most recently inserted half, so a very old duplicate
/// can be accepted again after enough newer traffic. That window is an
/// accepted trade-off for bounded memory.
#[derive(Debug, Clone)]
pub struct NonceCache {
	seen: IndexSet<String>,
	capacity: usize,
}

impl Default for NonceCache {
	fn default() -> Self {
		Self::new(DEFAULT_NONCE_CAPACITY)
	}
}

impl NonceCache {
	/// Creates a cache that compacts once it holds more than `capacity` nonces.
	///
	/// Storage grows with use; `capacity` is only a ceiling.
	///
	/// # Panics
	///
	/// Panics if `capacity` is below 2.
	pub fn new(capacity: usize) -> Self {
		assert!(capacity >= 2, "nonce cache capacity must be >= 2");
		Self {
			seen: IndexSet::new(),
			capacity,
		}
	}

	/// Accepts a request unless its nonce was already seen.
	pub fn accept(&mut self, request: &ActionRequest) -> bool {
		self.accept_id(request.request_id())
	}

	/// Records `nonce`, returning `false` if it is already present.
	pub fn accept_id(&mut self, nonce: &str) -> bool {
		if self.seen.contains(nonce) {
			return false;
		}
		self.seen.insert(nonce.to_owned());
		if self.seen.len() > self.capacity {
			let keep = self.capacity / 2;
			let evicted = self.seen.len() - keep;
			self.seen.drain(..evicted);
			tracing::debug!(evicted, kept = keep, "nonce.compact");
		}
		true
	}

	pub fn contains(&self, nonce: &str) -> bool {
		self.seen.contains(nonce)
	}

	pub fn len(&self) -> usize {
		self.seen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seen.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn clear(&mut self) {
		self.seen.clear();
	}
}
