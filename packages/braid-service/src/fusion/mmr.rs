use std::collections::HashSet;

use super::{Candidate, FusedEvidenceSet, FusedItem, rank_normalize};

const MAX_TEXT_TERMS: usize = 64;

/// Maximal marginal relevance over the candidate pool. Relevance is the best per-origin score
/// min-max normalized to [0, 1] (rank-normalized when a list's scores are degenerate);
/// redundancy is lexical token overlap against the already-selected set. Candidates above the
/// similarity threshold are only drawn on when nothing else is left to fill top-K.
pub fn fuse_mmr(
	candidates: Vec<Candidate>,
	lambda: f32,
	sim_threshold: f32,
	top_k: u32,
) -> FusedEvidenceSet {
	if candidates.is_empty() || top_k == 0 {
		return FusedEvidenceSet::default();
	}

	let relevance = normalized_relevance(&candidates);
	let tokens: Vec<HashSet<String>> =
		candidates.iter().map(|candidate| tokenize_terms(&candidate.item.text)).collect();
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();
	let mut selected: Vec<usize> = Vec::new();
	let mut fused: Vec<FusedItem> = Vec::new();

	while fused.len() < top_k as usize && !remaining.is_empty() {
		let mut best_clear: Option<(usize, f32)> = None;
		let mut best_any: Option<(usize, f32)> = None;

		for (pos, &idx) in remaining.iter().enumerate() {
			let max_sim = selected
				.iter()
				.map(|&chosen| token_overlap(&tokens[idx], &tokens[chosen]))
				.fold(0.0_f32, f32::max);
			let mmr = lambda * relevance[idx] - (1.0 - lambda) * max_sim;

			if beats(mmr, pos, best_any, &remaining, &candidates) {
				best_any = Some((pos, mmr));
			}
			if max_sim <= sim_threshold && beats(mmr, pos, best_clear, &remaining, &candidates) {
				best_clear = Some((pos, mmr));
			}
		}

		let Some((pos, mmr)) = best_clear.or(best_any) else { break };
		let idx = remaining.remove(pos);

		selected.push(idx);
		fused.push(FusedItem::new(candidates[idx].clone(), mmr));
	}

	FusedEvidenceSet { items: fused }
}

fn beats(
	mmr: f32,
	pos: usize,
	current: Option<(usize, f32)>,
	remaining: &[usize],
	candidates: &[Candidate],
) -> bool {
	let Some((current_pos, current_mmr)) = current else { return true };

	mmr > current_mmr
		|| (mmr == current_mmr
			&& candidates[remaining[pos]].order < candidates[remaining[current_pos]].order)
}

fn normalized_relevance(candidates: &[Candidate]) -> Vec<f32> {
	let vector_span = score_span(candidates.iter().filter_map(|candidate| candidate.vector_score));
	let graph_span = score_span(candidates.iter().filter_map(|candidate| candidate.graph_score));
	let vector_total =
		candidates.iter().filter(|candidate| candidate.vector_rank.is_some()).count() as u32;
	let graph_total =
		candidates.iter().filter(|candidate| candidate.graph_rank.is_some()).count() as u32;

	candidates
		.iter()
		.map(|candidate| {
			let vector_rel = candidate.vector_rank.map(|rank| {
				candidate
					.vector_score
					.and_then(|score| normalize_score(score, vector_span))
					.unwrap_or_else(|| rank_normalize(rank, vector_total))
			});
			let graph_rel = candidate.graph_rank.map(|rank| {
				candidate
					.graph_score
					.and_then(|score| normalize_score(score, graph_span))
					.unwrap_or_else(|| rank_normalize(rank, graph_total))
			});

			match (vector_rel, graph_rel) {
				(Some(a), Some(b)) => a.max(b),
				(Some(a), None) => a,
				(None, Some(b)) => b,
				(None, None) => 0.0,
			}
		})
		.collect()
}

fn score_span(scores: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
	let mut span: Option<(f32, f32)> = None;

	for score in scores {
		if !score.is_finite() {
			continue;
		}

		span = Some(match span {
			None => (score, score),
			Some((min, max)) => (min.min(score), max.max(score)),
		});
	}

	span
}

fn normalize_score(score: f32, span: Option<(f32, f32)>) -> Option<f32> {
	let (min, max) = span?;

	if !score.is_finite() {
		return None;
	}

	let width = max - min;

	if width <= f32::EPSILON {
		return None;
	}

	Some(((score - min) / width).clamp(0.0, 1.0))
}

fn tokenize_terms(text: &str) -> HashSet<String> {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	let mut out = HashSet::new();

	for token in normalized.split_whitespace() {
		if token.len() < 2 {
			continue;
		}

		out.insert(token.to_string());

		if out.len() >= MAX_TEXT_TERMS {
			break;
		}
	}

	out
}

fn token_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}

	let intersection = a.intersection(b).count();
	let union = a.len() + b.len() - intersection;

	if union == 0 { 0.0 } else { intersection as f32 / union as f32 }
}
