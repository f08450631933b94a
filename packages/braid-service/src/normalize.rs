use braid_domain::evidence::{
	EvidenceItem, EvidenceOrigin, METADATA_CHUNK_INDEX, METADATA_DOCUMENT_ID, METADATA_ENTITY_ID,
	METADATA_GROUP_ID, METADATA_RELATION, METADATA_SOURCE_ENTITY, METADATA_TARGET_ENTITY,
	Metadata, MetadataValue,
};
use braid_storage::{
	graph::edge_fact_text,
	models::{ChunkHit, GraphHit},
};

/// Store rows become evidence items with 1-based ranks in list order. Absent optional fields
/// collapse to empty strings or missing metadata keys, never to errors.
pub fn vector_evidence(hits: &[ChunkHit]) -> Vec<EvidenceItem> {
	hits.iter()
		.enumerate()
		.map(|(idx, hit)| {
			let mut metadata = Metadata::new();

			if let Some(document_id) = hit.document_id {
				metadata.insert(
					METADATA_DOCUMENT_ID.to_string(),
					MetadataValue::from(document_id.to_string()),
				);
			}
			if let Some(chunk_index) = hit.chunk_index {
				metadata.insert(
					METADATA_CHUNK_INDEX.to_string(),
					MetadataValue::Integer(i64::from(chunk_index)),
				);
			}
			if let Some(entity_id) = hit.entity_id {
				metadata.insert(
					METADATA_ENTITY_ID.to_string(),
					MetadataValue::from(entity_id.to_string()),
				);
			}

			EvidenceItem {
				id: hit.chunk_id,
				origin: EvidenceOrigin::VectorChunk,
				text: hit.text.clone(),
				score: hit.score,
				rank: idx as u32 + 1,
				valid_at: None,
				invalid_at: None,
				expired: false,
				metadata,
			}
		})
		.collect()
}

pub fn graph_evidence(hits: &[GraphHit]) -> Vec<EvidenceItem> {
	hits.iter()
		.enumerate()
		.map(|(idx, hit)| {
			let rank = idx as u32 + 1;

			match hit {
				GraphHit::Node(node) => {
					let summary = node.summary.as_deref().map(str::trim).unwrap_or("");
					let text = if summary.is_empty() {
						node.name.clone()
					} else {
						format!("{}: {summary}", node.name)
					};
					let mut metadata = Metadata::new();

					metadata.insert(
						METADATA_GROUP_ID.to_string(),
						MetadataValue::from(node.group_id.as_str()),
					);

					EvidenceItem {
						id: node.node_id,
						origin: EvidenceOrigin::GraphNode,
						text,
						score: node.score,
						rank,
						valid_at: None,
						invalid_at: None,
						expired: false,
						metadata,
					}
				},
				GraphHit::Edge(edge) => {
					let mut metadata = Metadata::new();

					metadata.insert(
						METADATA_RELATION.to_string(),
						MetadataValue::from(edge.relation.as_str()),
					);
					metadata.insert(
						METADATA_SOURCE_ENTITY.to_string(),
						MetadataValue::from(edge.source_name.as_str()),
					);
					metadata.insert(
						METADATA_TARGET_ENTITY.to_string(),
						MetadataValue::from(edge.target_name.as_str()),
					);
					metadata.insert(
						METADATA_GROUP_ID.to_string(),
						MetadataValue::from(edge.group_id.as_str()),
					);

					EvidenceItem {
						id: edge.edge_id,
						origin: EvidenceOrigin::GraphEdge,
						text: edge_fact_text(edge),
						score: edge.score,
						rank,
						valid_at: edge.valid_at,
						invalid_at: edge.invalid_at,
						expired: edge.expired_at.is_some(),
						metadata,
					}
				},
				GraphHit::Path(path) => EvidenceItem {
					id: path.path_id,
					origin: EvidenceOrigin::GraphPath,
					text: path.fact.clone(),
					score: path.score,
					rank,
					valid_at: None,
					invalid_at: None,
					expired: false,
					metadata: Metadata::new(),
				},
			}
		})
		.collect()
}
