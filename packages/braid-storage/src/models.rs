use time::OffsetDateTime;
use uuid::Uuid;

/// One vector-store top-K request.
#[derive(Debug, Clone)]
pub struct VectorSearch {
	pub embedding: Vec<f32>,
	pub top_k: u32,
	pub namespace: String,
}

/// One graph-store hybrid search request. `center_entity_id` biases ordering toward graph
/// proximity without filtering anything out.
#[derive(Debug, Clone)]
pub struct GraphSearch {
	pub query_text: String,
	pub embedding: Vec<f32>,
	pub top_k: u32,
	pub namespace: String,
	pub center_entity_id: Option<Uuid>,
	pub traversal_depth: u32,
}

#[derive(Debug, Clone)]
pub struct ChunkHit {
	pub chunk_id: Uuid,
	pub document_id: Option<Uuid>,
	pub chunk_index: Option<i32>,
	pub entity_id: Option<Uuid>,
	pub text: String,
	pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphElementKind {
	Node,
	Edge,
	Path,
}

#[derive(Debug, Clone)]
pub struct GraphNodeHit {
	pub node_id: Uuid,
	pub name: String,
	pub summary: Option<String>,
	pub group_id: String,
	pub score: f32,
	pub hops_from_center: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct GraphEdgeHit {
	pub edge_id: Uuid,
	pub relation: String,
	pub fact: Option<String>,
	pub source_node_id: Uuid,
	pub target_node_id: Uuid,
	pub source_name: String,
	pub target_name: String,
	pub valid_at: Option<OffsetDateTime>,
	pub invalid_at: Option<OffsetDateTime>,
	pub expired_at: Option<OffsetDateTime>,
	pub group_id: String,
	pub score: f32,
	pub hops_from_center: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct GraphPathHit {
	pub path_id: Uuid,
	pub edge_ids: Vec<Uuid>,
	pub fact: String,
	pub score: f32,
}

#[derive(Debug, Clone)]
pub enum GraphHit {
	Node(GraphNodeHit),
	Edge(GraphEdgeHit),
	Path(GraphPathHit),
}
impl GraphHit {
	pub fn element_id(&self) -> Uuid {
		match self {
			Self::Node(node) => node.node_id,
			Self::Edge(edge) => edge.edge_id,
			Self::Path(path) => path.path_id,
		}
	}

	pub fn kind(&self) -> GraphElementKind {
		match self {
			Self::Node(_) => GraphElementKind::Node,
			Self::Edge(_) => GraphElementKind::Edge,
			Self::Path(_) => GraphElementKind::Path,
		}
	}

	pub fn score(&self) -> f32 {
		match self {
			Self::Node(node) => node.score,
			Self::Edge(edge) => edge.score,
			Self::Path(path) => path.score,
		}
	}

	pub fn hops_from_center(&self) -> Option<i32> {
		match self {
			Self::Node(node) => node.hops_from_center,
			Self::Edge(edge) => edge.hops_from_center,
			Self::Path(_) => None,
		}
	}
}
