use super::{Candidate, FusedEvidenceSet, FusedItem, cmp_f32_desc};

/// Reciprocal rank fusion. Each candidate sums `1 / (k + rank)` over the retrieval lists it
/// appears in, so cross-method agreement is rewarded and never penalized. Ties fall back to
/// combined insertion order, vector before graph.
pub fn fuse_rrf(candidates: Vec<Candidate>, rrf_k: u32, top_k: u32) -> FusedEvidenceSet {
	let mut scored: Vec<(f32, Candidate)> = candidates
		.into_iter()
		.map(|candidate| {
			let mut score = 0.0_f32;

			for rank in [candidate.vector_rank, candidate.graph_rank].into_iter().flatten() {
				score += 1.0 / (rrf_k as f32 + rank as f32);
			}

			(score, candidate)
		})
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
