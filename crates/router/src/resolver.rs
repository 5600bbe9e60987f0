//! Maps an abstract [`Selector`] to one concrete candidate of a record.

use std::sync::Arc;

use herald_invocation::Selector;

use crate::error::RouteError;
use crate::record::{Candidate, Record};

/// Which resolution step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
	Ordinal,
	LogicalIndex,
	Label,
	/// Nothing matched; the last candidate was used.
	Fallback,
}

/// The chosen candidate and how it was found.
#[derive(Debug, Clone)]
pub struct Resolution {
	pub candidate: Arc<Candidate>,
	/// Position of the candidate in the record's list.
	pub position: usize,
	pub matched_by: MatchKind,
}

impl Resolution {
	pub fn is_degraded(&self) -> bool {
		self.matched_by == MatchKind::Fallback
	}
}

/// Stateless resolver; records are read at resolution time only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationResolver;

impl OperationResolver {
	/// Picks a candidate, first match wins:
	///
	/// 1. `ordinal` within bounds selects that position.
	/// 2. `logical_index` equal to the candidate's, with the label also
	///    matching when one is given.
	/// 3. `label` selects the first candidate with that label.
	/// 4. Otherwise the last candidate.
	///
	/// Labels compare case-insensitively after trimming.
	pub fn resolve(&self, record: &dyn Record, selector: &Selector) -> Result<Resolution, RouteError> {
		let candidates = record.candidates();
		let Some(last) = candidates.len().checked_sub(1) else {
			return Err(RouteError::NoMatchingOperation(record.id().clone()));
		};

		let found = |position: usize, matched_by: MatchKind| Resolution {
			candidate: Arc::clone(&candidates[position]),
			position,
			matched_by,
		};

		if let Some(position) = selector.position()
			&& position <= last
		{
			return Ok(found(position, MatchKind::Ordinal));
		}

		if let Some(index) = &selector.logical_index
			&& let Some(position) = candidates.iter().position(|c| {
				c.logical_index().is_some_and(|own| own.trim() == index.trim())
					&& selector.label.as_deref().is_none_or(|label| labels_match(c.label(), label))
			}) {
			return Ok(found(position, MatchKind::LogicalIndex));
		}

		if let Some(label) = &selector.label
			&& let Some(position) = candidates.iter().position(|c| labels_match(c.label(), label))
		{
			return Ok(found(position, MatchKind::Label));
		}

		tracing::warn!(
			record_id = %record.id(),
			selector = %selector.describe(),
			candidates = candidates.len(),
			"resolver.degraded_match"
		);
		Ok(found(last, MatchKind::Fallback))
	}

	/// Validates the chosen candidate's logical index against the record's
	/// result count and writes a corrected value back when it is missing,
	/// non-numeric, or out of range.
	///
	/// The correction prefers the selector's ordinal, then the candidate's
	/// position, then the maximum valid index. Returns the effective index,
	/// or `None` if the record reports no results at all.
	pub fn repair(&self, record: &dyn Record, resolution: &Resolution, selector: &Selector) -> Option<usize> {
		let bound = record.result_count();
		let Some(max) = bound.checked_sub(1) else {
			tracing::debug!(record_id = %record.id(), "resolver.repair.no_results");
			return resolution.candidate.numeric_index();
		};

		let current = resolution.candidate.numeric_index();
		if let Some(index) = current
			&& index <= max
		{
			return Some(index);
		}

		let corrected = selector
			.position()
			.filter(|o| *o <= max)
			.or(Some(resolution.position).filter(|p| *p <= max))
			.unwrap_or(max);

		tracing::debug!(
			record_id = %record.id(),
			was = ?resolution.candidate.logical_index(),
			corrected,
			bound,
			"resolver.repair"
		);
		resolution.candidate.set_logical_index(corrected);
		Some(corrected)
	}
}

fn labels_match(own: &str, wanted: &str) -> bool {
	own.trim().to_lowercase() == wanted.trim().to_lowercase()
}
