use time::OffsetDateTime;

use crate::evidence::EvidenceItem;

/// Outcome of checking a fact's validity interval against a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalValidity {
	Valid,
	NotYetValid,
	Expired,
	/// `invalid_at <= valid_at`. Malformed intervals must not abort a query; the caller logs
	/// them and drops the item.
	Malformed,
}

pub fn classify(item: &EvidenceItem, reference_time: OffsetDateTime) -> TemporalValidity {
	if !item.origin.is_graph() {
		return TemporalValidity::Valid;
	}
	if item.expired {
		return TemporalValidity::Expired;
	}

	let Some(valid_at) = item.valid_at else {
		// Unstamped extraction. No temporal semantics, treated as always valid.
		return TemporalValidity::Valid;
	};

	if let Some(invalid_at) = item.invalid_at
		&& invalid_at <= valid_at
	{
		return TemporalValidity::Malformed;
	}
	if valid_at > reference_time {
		return TemporalValidity::NotYetValid;
	}
	if item.invalid_at.map(|invalid_at| invalid_at <= reference_time).unwrap_or(false) {
		return TemporalValidity::Expired;
	}

	TemporalValidity::Valid
}

pub fn is_currently_valid(item: &EvidenceItem, reference_time: OffsetDateTime) -> bool {
	classify(item, reference_time) == TemporalValidity::Valid
}
