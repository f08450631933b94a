use std::collections::HashMap;

use uuid::Uuid;

use braid_domain::evidence::EvidenceItem;

use super::{Candidate, MergePolicy, RetrievalResult};

/// Combines the two normalized retrieval results into one deduplicated candidate pool.
///
/// The same id surfacing in both lists is always collapsed into one candidate carrying both
/// per-origin ranks. Cross-origin entity merging (a chunk whose `entity_id` metadata names a
/// retrieved graph element) only happens under `MergePolicy::Merge`; without a reliable
/// cross-reference key items stay separate.
pub fn combine(
	vector_result: RetrievalResult,
	graph_result: RetrievalResult,
	policy: MergePolicy,
) -> Vec<Candidate> {
	let mut out: Vec<Candidate> =
		Vec::with_capacity(vector_result.items.len() + graph_result.items.len());
	let mut index_by_id: HashMap<Uuid, usize> = HashMap::new();
	let mut index_by_entity: HashMap<String, usize> = HashMap::new();

	for item in vector_result.items {
		if index_by_id.contains_key(&item.id) {
			continue;
		}

		let idx = out.len();

		index_by_id.insert(item.id, idx);

		if let Some(entity) = item.entity_id() {
			index_by_entity.entry(entity.to_string()).or_insert(idx);
		}

		out.push(Candidate {
			vector_rank: Some(item.rank),
			vector_score: Some(item.score),
			graph_rank: None,
			graph_score: None,
			order: idx as u32,
			item,
		});
	}

	for item in graph_result.items {
		if let Some(&idx) = index_by_id.get(&item.id) {
			let candidate = &mut out[idx];

			if candidate.graph_rank.is_none() {
				candidate.graph_rank = Some(item.rank);
				candidate.graph_score = Some(item.score);
			}

			continue;
		}

		if policy == MergePolicy::Merge
			&& let Some(&idx) = index_by_entity.get(&item.id.to_string())
			&& out[idx].graph_rank.is_none()
		{
			index_by_id.insert(item.id, idx);

			let candidate = &mut out[idx];

			candidate.graph_rank = Some(item.rank);
			candidate.graph_score = Some(item.score);
			candidate.item = merged_item(&candidate.item, item);

			continue;
		}

		let idx = out.len();

		index_by_id.insert(item.id, idx);
		out.push(Candidate {
			vector_rank: None,
			vector_score: None,
			graph_rank: Some(item.rank),
			graph_score: Some(item.score),
			order: idx as u32,
			item,
		});
	}

	out
}

/// The merged record keeps the graph-origin explanatory text and identity, the higher of the
/// two scores, and the union of both metadata maps (graph values win on key conflicts).
fn merged_item(chunk: &EvidenceItem, graph: EvidenceItem) -> EvidenceItem {
	let mut metadata = chunk.metadata.clone();

	for (key, value) in graph.metadata {
		metadata.insert(key, value);
	}

	EvidenceItem {
		id: graph.id,
		origin: graph.origin,
		text: graph.text,
		score: chunk.score.max(graph.score),
		rank: graph.rank,
		valid_at: graph.valid_at,
		invalid_at: graph.invalid_at,
		expired: graph.expired,
		metadata,
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use braid_domain::evidence::{EvidenceOrigin, METADATA_ENTITY_ID, Metadata, MetadataValue};

	fn vector_result(items: Vec<EvidenceItem>) -> RetrievalResult {
		RetrievalResult::vector("q", items)
	}

	fn graph_result(items: Vec<EvidenceItem>) -> RetrievalResult {
		RetrievalResult::graph("q", items)
	}

	fn chunk(id: Uuid, rank: u32, score: f32, entity: Option<Uuid>) -> EvidenceItem {
		let mut metadata = Metadata::new();

		if let Some(entity) = entity {
			metadata
				.insert(METADATA_ENTITY_ID.to_string(), MetadataValue::from(entity.to_string()));
		}

		EvidenceItem {
			id,
			origin: EvidenceOrigin::VectorChunk,
			text: format!("chunk {rank}"),
			score,
			rank,
			valid_at: None,
			invalid_at: None,
			expired: false,
			metadata,
		}
	}

	fn node(id: Uuid, rank: u32, score: f32) -> EvidenceItem {
		EvidenceItem {
			id,
			origin: EvidenceOrigin::GraphNode,
			text: format!("node {rank}"),
			score,
			rank,
			valid_at: None,
			invalid_at: None,
			expired: false,
			metadata: Metadata::new(),
		}
	}

	#[test]
	fn keeps_items_separate_without_a_cross_reference_key() {
		let combined = combine(
			vector_result(vec![chunk(Uuid::new_v4(), 1, 0.9, None)]),
			graph_result(vec![node(Uuid::new_v4(), 1, 0.8)]),
			MergePolicy::Merge,
		);

		assert_eq!(combined.len(), 2);
	}

	#[test]
	fn same_id_across_channels_collapses_and_keeps_both_ranks() {
		let id = Uuid::new_v4();
		let combined = combine(
			vector_result(vec![chunk(id, 2, 0.7, None)]),
			graph_result(vec![node(id, 1, 0.8)]),
			MergePolicy::Separate,
		);

		assert_eq!(combined.len(), 1);
		assert_eq!(combined[0].vector_rank, Some(2));
		assert_eq!(combined[0].graph_rank, Some(1));
	}

	#[test]
	fn entity_link_merges_only_under_merge_policy() {
		let entity = Uuid::new_v4();
		let chunk_item = chunk(Uuid::new_v4(), 1, 0.9, Some(entity));
		let node_item = node(entity, 1, 0.4);
		let separate = combine(
			vector_result(vec![chunk_item.clone()]),
			graph_result(vec![node_item.clone()]),
			MergePolicy::Separate,
		);

		assert_eq!(separate.len(), 2);

		let merged = combine(
			vector_result(vec![chunk_item]),
			graph_result(vec![node_item]),
			MergePolicy::Merge,
		);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].item.id, entity);
		assert_eq!(merged[0].item.origin, EvidenceOrigin::GraphNode);
		assert_eq!(merged[0].item.text, "node 1");
		assert!((merged[0].item.score - 0.9).abs() < 1e-6);
		assert_eq!(merged[0].vector_rank, Some(1));
		assert_eq!(merged[0].graph_rank, Some(1));
	}

	#[test]
	fn duplicate_ids_within_one_channel_keep_first_occurrence() {
		let id = Uuid::new_v4();
		let combined = combine(
			vector_result(vec![chunk(id, 1, 0.9, None), chunk(id, 2, 0.5, None)]),
			graph_result(Vec::new()),
			MergePolicy::Separate,
		);

		assert_eq!(combined.len(), 1);
		assert_eq!(combined[0].vector_rank, Some(1));
	}
}
