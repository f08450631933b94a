use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

/// Metadata key carrying the graph entity a vector chunk is linked to. Presence of the same
/// value on a graph hit and a vector hit is the only cross-reference the merge policy trusts.
pub const METADATA_ENTITY_ID: &str = "entity_id";
pub const METADATA_DOCUMENT_ID: &str = "source_document_id";
pub const METADATA_CHUNK_INDEX: &str = "chunk_index";
pub const METADATA_RELATION: &str = "relation";
pub const METADATA_SOURCE_ENTITY: &str = "source_entity";
pub const METADATA_TARGET_ENTITY: &str = "target_entity";
pub const METADATA_GROUP_ID: &str = "group_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceOrigin {
	VectorChunk,
	GraphNode,
	GraphEdge,
	GraphPath,
}
impl EvidenceOrigin {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::VectorChunk => "VECTOR_CHUNK",
			Self::GraphNode => "GRAPH_NODE",
			Self::GraphEdge => "GRAPH_EDGE",
			Self::GraphPath => "GRAPH_PATH",
		}
	}

	pub fn is_graph(self) -> bool {
		matches!(self, Self::GraphNode | Self::GraphEdge | Self::GraphPath)
	}
}

/// A single primitive metadata value. Downstream stores reject nested structures, so values
/// are restricted to scalars and flat lists of scalars.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Integer(i64),
	Float(f64),
	Text(String),
	List(Vec<MetadataScalar>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetadataScalar {
	Bool(bool),
	Integer(i64),
	Float(f64),
	Text(String),
}

impl MetadataValue {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(value) => Some(value.as_str()),
			_ => None,
		}
	}
}

impl From<&str> for MetadataValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for MetadataValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<i64> for MetadataValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// The unit the fusion engine operates on, regardless of which store produced it. Items live
/// for one query and are never persisted.
#[derive(Debug, Clone)]
pub struct EvidenceItem {
	pub id: Uuid,
	pub origin: EvidenceOrigin,
	pub text: String,
	/// Retrieval-method-local relevance score. Not comparable across origins without
	/// normalization.
	pub score: f32,
	/// 1-based position within this item's own origin retrieval list.
	pub rank: u32,
	pub valid_at: Option<OffsetDateTime>,
	pub invalid_at: Option<OffsetDateTime>,
	pub expired: bool,
	pub metadata: Metadata,
}
impl EvidenceItem {
	pub fn entity_id(&self) -> Option<&str> {
		self.metadata.get(METADATA_ENTITY_ID).and_then(MetadataValue::as_text)
	}
}
