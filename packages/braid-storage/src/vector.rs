use std::collections::{HashMap, HashSet};

use qdrant_client::qdrant::{
	Condition, Filter, PointId, Query, QueryPointsBuilder, ScoredPoint, Value,
	point_id::PointIdOptions, value::Kind,
};
use uuid::Uuid;

use crate::{Result, models::{ChunkHit, VectorSearch}};

pub const PAYLOAD_TEXT: &str = "text";
pub const PAYLOAD_DOCUMENT_ID: &str = "source_document_id";
pub const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";
pub const PAYLOAD_ENTITY_ID: &str = "entity_id";
pub const PAYLOAD_GROUP_ID: &str = "group_id";

pub struct VectorStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl VectorStore {
	pub fn new(cfg: &braid_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Top-K nearest chunks within a namespace, ordered by descending similarity. Qdrant's
	/// ordering is preserved as-is; it is stable for identical snapshots.
	pub async fn top_chunks(&self, search: &VectorSearch) -> Result<Vec<ChunkHit>> {
		let filter = Filter {
			must: vec![Condition::matches(PAYLOAD_GROUP_ID, search.namespace.clone())],
			should: Vec::new(),
			must_not: Vec::new(),
			min_should: None,
		};
		let query = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(search.embedding.clone()))
			.filter(filter)
			.with_payload(true)
			.limit(search.top_k as u64);
		let response = self.client.query(query).await?;

		Ok(collect_chunk_hits(&response.result))
	}
}

pub fn collect_chunk_hits(points: &[ScoredPoint]) -> Vec<ChunkHit> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for point in points {
		let chunk_id = point
			.id
			.as_ref()
			.and_then(point_id_to_uuid)
			.or_else(|| payload_uuid(&point.payload, "chunk_id"));
		let Some(chunk_id) = chunk_id else {
			tracing::warn!("Chunk hit missing chunk_id.");

			continue;
		};

		if !seen.insert(chunk_id) {
			continue;
		}

		let Some(text) = payload_string(&point.payload, PAYLOAD_TEXT) else {
			tracing::warn!(chunk_id = %chunk_id, "Chunk hit missing text payload.");

			continue;
		};

		out.push(ChunkHit {
			chunk_id,
			document_id: payload_uuid(&point.payload, PAYLOAD_DOCUMENT_ID),
			chunk_index: payload_i32(&point.payload, PAYLOAD_CHUNK_INDEX),
			entity_id: payload_uuid(&point.payload, PAYLOAD_ENTITY_ID),
			text,
			score: point.score,
		});
	}

	out
}

pub fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_uuid(payload: &HashMap<String, Value>, key: &str) -> Option<Uuid> {
	payload_string(payload, key).and_then(|text| Uuid::parse_str(&text).ok())
}

pub fn payload_i32(payload: &HashMap<String, Value>, key: &str) -> Option<i32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => i32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				i32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}
