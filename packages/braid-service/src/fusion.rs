mod merge;
mod mmr;
mod rrf;

pub use merge::combine;
pub use mmr::fuse_mmr;
pub use rrf::fuse_rrf;

use std::cmp::Ordering;

use braid_domain::evidence::EvidenceItem;

use crate::query::RetrievalChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
	Rrf,
	Mmr,
	Rerank,
}
impl FusionStrategy {
	pub fn resolve(raw: &str) -> Option<Self> {
		match raw {
			"rrf" => Some(Self::Rrf),
			"mmr" => Some(Self::Mmr),
			"rerank" => Some(Self::Rerank),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Rrf => "rrf",
			Self::Mmr => "mmr",
			Self::Rerank => "rerank",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
	Separate,
	Merge,
}
impl MergePolicy {
	pub fn resolve(raw: &str) -> Option<Self> {
		match raw {
			"separate" => Some(Self::Separate),
			"merge" => Some(Self::Merge),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Separate => "separate",
			Self::Merge => "merge",
		}
	}
}

/// One adapter's output for one query: an ordered evidence list tagged with the channel that
/// produced it and the query text it answered.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
	pub channel: RetrievalChannel,
	pub query_text: String,
	pub items: Vec<EvidenceItem>,
}
impl RetrievalResult {
	pub fn vector(query_text: impl Into<String>, items: Vec<EvidenceItem>) -> Self {
		Self { channel: RetrievalChannel::Vector, query_text: query_text.into(), items }
	}

	pub fn graph(query_text: impl Into<String>, items: Vec<EvidenceItem>) -> Self {
		Self { channel: RetrievalChannel::Graph, query_text: query_text.into(), items }
	}
}

/// One deduplicated entry in the cross-origin candidate pool. `order` is the combined
/// insertion position (vector list first, then graph), the stable tie-break for every
/// strategy.
#[derive(Debug, Clone)]
pub struct Candidate {
	pub item: EvidenceItem,
	pub vector_rank: Option<u32>,
	pub graph_rank: Option<u32>,
	pub vector_score: Option<f32>,
	pub graph_score: Option<f32>,
	pub order: u32,
}

#[derive(Debug, Clone)]
pub struct FusedItem {
	pub item: EvidenceItem,
	pub fused_score: f32,
	pub vector_rank: Option<u32>,
	pub graph_rank: Option<u32>,
	pub vector_score: Option<f32>,
	pub graph_score: Option<f32>,
}
impl FusedItem {
	pub(crate) fn new(candidate: Candidate, fused_score: f32) -> Self {
		Self {
			item: candidate.item,
			fused_score,
			vector_rank: candidate.vector_rank,
			graph_rank: candidate.graph_rank,
			vector_score: candidate.vector_score,
			graph_score: candidate.graph_score,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct FusedEvidenceSet {
	pub items: Vec<FusedItem>,
}

/// External-reranker passthrough: the engine only aligns provider scores with candidates and
/// sorts. Missing scores sink to the bottom instead of failing.
pub fn order_by_scores(candidates: Vec<Candidate>, scores: &[f32], top_k: u32) -> FusedEvidenceSet {
	let mut scored: Vec<(f32, Candidate)> = candidates
		.into_iter()
		.enumerate()
		.map(|(idx, candidate)| (scores.get(idx).copied().unwrap_or(f32::NAN), candidate))
		.collect();

	scored.sort_by(|(score_a, a), (score_b, b)| {
		cmp_f32_desc(*score_a, *score_b).then_with(|| a.order.cmp(&b.order))
	});

	FusedEvidenceSet {
		items: scored
			.into_iter()
			.take(top_k as usize)
			.map(|(score, candidate)| FusedItem::new(candidate, score))
			.collect(),
	}
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

pub fn rank_normalize(rank: u32, total: u32) -> f32 {
	if total <= 1 {
		return 1.0;
	}
	if rank == 0 {
		return 0.0;
	}

	let denom = (total - 1) as f32;
	let pos = (rank.saturating_sub(1)) as f32;

	(1.0 - pos / denom).clamp(0.0, 1.0)
}
