use std::{cmp::Ordering, collections::HashMap};

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{GraphEdgeHit, GraphHit, GraphNodeHit, GraphPathHit, GraphSearch},
};

const SEMANTIC_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.3;
const MAX_PATHS: usize = 3;

const NODE_SEARCH_SQL: &str = "\
SELECT
	n.node_id,
	n.name,
	n.summary,
	n.group_id,
	(1 - (n.vec <=> $1::text::vector))::real AS similarity,
	ts_rank_cd(
		to_tsvector('english', n.name || ' ' || COALESCE(n.summary, '')),
		plainto_tsquery('english', $2)
	)::real AS text_rank
FROM graph_nodes n
WHERE n.group_id = $3 AND n.vec IS NOT NULL
ORDER BY n.vec <=> $1::text::vector, n.node_id
LIMIT $4";

const EDGE_SEARCH_SQL: &str = "\
SELECT
	e.edge_id,
	e.relation,
	e.fact,
	e.source_node_id,
	e.target_node_id,
	s.name AS source_name,
	t.name AS target_name,
	e.valid_at,
	e.invalid_at,
	e.expired_at,
	e.group_id,
	(1 - (e.vec <=> $1::text::vector))::real AS similarity,
	ts_rank_cd(
		to_tsvector('english', COALESCE(e.fact, e.relation)),
		plainto_tsquery('english', $2)
	)::real AS text_rank
FROM graph_edges e
JOIN graph_nodes s ON s.node_id = e.source_node_id
JOIN graph_nodes t ON t.node_id = e.target_node_id
WHERE e.group_id = $3 AND e.vec IS NOT NULL
ORDER BY e.vec <=> $1::text::vector, e.edge_id
LIMIT $4";

const NODE_DISTANCES_SQL: &str = "\
WITH RECURSIVE walk (node_id, hops) AS (
	SELECT $1::uuid, 0
	UNION ALL
	SELECT
		CASE WHEN e.source_node_id = w.node_id THEN e.target_node_id ELSE e.source_node_id END,
		w.hops + 1
	FROM graph_edges e
	JOIN walk w ON w.node_id IN (e.source_node_id, e.target_node_id)
	WHERE e.group_id = $3 AND w.hops < $2
)
SELECT node_id, MIN(hops)::int AS hops
FROM walk
GROUP BY node_id";

#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
	node_id: Uuid,
	name: String,
	summary: Option<String>,
	group_id: String,
	similarity: f32,
	text_rank: f32,
}

#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
	edge_id: Uuid,
	relation: String,
	fact: Option<String>,
	source_node_id: Uuid,
	target_node_id: Uuid,
	source_name: String,
	target_name: String,
	valid_at: Option<OffsetDateTime>,
	invalid_at: Option<OffsetDateTime>,
	expired_at: Option<OffsetDateTime>,
	group_id: String,
	similarity: f32,
	text_rank: f32,
}

pub fn normalize_entity_name(input: &str) -> String {
	input.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Renders an embedding as the pgvector text literal accepted by `$n::text::vector` casts.
pub fn vector_literal(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// Full-text plus embedding-similarity search over nodes and edges, with bounded two-hop
/// paths assembled from the surviving edges. When a center entity is supplied, hop distance
/// from it breaks score ties; it never filters.
pub async fn hybrid_search(pool: &PgPool, search: &GraphSearch) -> Result<Vec<GraphHit>> {
	let vec_text = vector_literal(&search.embedding);
	let fetch_k = i64::from(search.top_k.max(1)) * 2;
	let node_rows: Vec<NodeRow> = sqlx::query_as(NODE_SEARCH_SQL)
		.bind(vec_text.as_str())
		.bind(search.query_text.as_str())
		.bind(search.namespace.as_str())
		.bind(fetch_k)
		.fetch_all(pool)
		.await?;
	let edge_rows: Vec<EdgeRow> = sqlx::query_as(EDGE_SEARCH_SQL)
		.bind(vec_text.as_str())
		.bind(search.query_text.as_str())
		.bind(search.namespace.as_str())
		.bind(fetch_k)
		.fetch_all(pool)
		.await?;
	let distances = match search.center_entity_id {
		Some(center) if search.traversal_depth > 0 =>
			node_distances(pool, center, search.traversal_depth, &search.namespace).await?,
		_ => HashMap::new(),
	};

	let mut hits: Vec<GraphHit> = Vec::with_capacity(node_rows.len() + edge_rows.len());

	for row in node_rows {
		let score = combined_score(row.similarity, row.text_rank);

		hits.push(GraphHit::Node(GraphNodeHit {
			node_id: row.node_id,
			name: row.name,
			summary: row.summary,
			group_id: row.group_id,
			score,
			hops_from_center: distances.get(&row.node_id).copied(),
		}));
	}

	let mut edges: Vec<GraphEdgeHit> = Vec::with_capacity(edge_rows.len());

	for row in edge_rows {
		let score = combined_score(row.similarity, row.text_rank);
		let hops = match (distances.get(&row.source_node_id), distances.get(&row.target_node_id))
		{
			(Some(a), Some(b)) => Some(*a.min(b)),
			(Some(a), None) => Some(*a),
			(None, Some(b)) => Some(*b),
			(None, None) => None,
		};

		edges.push(GraphEdgeHit {
			edge_id: row.edge_id,
			relation: row.relation,
			fact: row.fact,
			source_node_id: row.source_node_id,
			target_node_id: row.target_node_id,
			source_name: row.source_name,
			target_name: row.target_name,
			valid_at: row.valid_at,
			invalid_at: row.invalid_at,
			expired_at: row.expired_at,
			group_id: row.group_id,
			score,
			hops_from_center: hops,
		});
	}

	let paths =
		if search.traversal_depth >= 2 { assemble_paths(&edges, MAX_PATHS) } else { Vec::new() };

	hits.extend(edges.into_iter().map(GraphHit::Edge));
	hits.extend(paths.into_iter().map(GraphHit::Path));
	hits.sort_by(compare_hits);
	hits.truncate(search.top_k as usize);

	Ok(hits)
}

async fn node_distances(
	pool: &PgPool,
	center: Uuid,
	depth: u32,
	namespace: &str,
) -> Result<HashMap<Uuid, i32>> {
	let rows: Vec<(Uuid, i32)> = sqlx::query_as(NODE_DISTANCES_SQL)
		.bind(center)
		.bind(depth as i32)
		.bind(namespace)
		.fetch_all(pool)
		.await?;

	Ok(rows.into_iter().collect())
}

/// Chains pairs of retrieved edges that share an intermediate node into two-hop path hits.
/// The path id is derived from the ordered edge chain, so identical chains get identical ids
/// across queries.
pub fn assemble_paths(edges: &[GraphEdgeHit], max_paths: usize) -> Vec<GraphPathHit> {
	let mut out = Vec::new();

	for first in edges {
		for second in edges {
			if first.edge_id == second.edge_id || first.target_node_id != second.source_node_id {
				continue;
			}

			let first_fact = edge_fact_text(first);
			let second_fact = edge_fact_text(second);
			let mut id_bytes = Vec::with_capacity(32);

			id_bytes.extend_from_slice(first.edge_id.as_bytes());
			id_bytes.extend_from_slice(second.edge_id.as_bytes());

			out.push(GraphPathHit {
				path_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, &id_bytes),
				edge_ids: vec![first.edge_id, second.edge_id],
				fact: format!("{first_fact} {second_fact}"),
				score: (first.score + second.score) / 2.0,
			});

			if out.len() >= max_paths {
				return out;
			}
		}
	}

	out
}

pub fn edge_fact_text(edge: &GraphEdgeHit) -> String {
	match edge.fact.as_deref().map(str::trim).filter(|fact| !fact.is_empty()) {
		Some(fact) => fact.to_string(),
		None => format!("{} {} {}", edge.source_name, edge.relation, edge.target_name),
	}
}

fn combined_score(similarity: f32, text_rank: f32) -> f32 {
	SEMANTIC_WEIGHT * similarity + LEXICAL_WEIGHT * text_rank.min(1.0)
}

fn compare_hits(left: &GraphHit, right: &GraphHit) -> Ordering {
	cmp_score_desc(left.score(), right.score())
		.then_with(|| {
			let lhs = left.hops_from_center().unwrap_or(i32::MAX);
			let rhs = right.hops_from_center().unwrap_or(i32::MAX);

			lhs.cmp(&rhs)
		})
		.then_with(|| left.element_id().cmp(&right.element_id()))
}

fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
