//! Deterministic in-process fakes for the service's collaborator traits, plus a ready-made
//! test config. Everything here is scripted; nothing talks to a live store or provider.

use std::time::Duration;

use color_eyre::eyre;
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use braid_config::{
	Cache, Config, ContextBudget, EmbeddingProviderConfig, Fusion, LlmProviderConfig, Postgres,
	ProviderConfig, Providers, Qdrant, Retrieval, Service, Storage,
};
use braid_service::{
	BoxFuture, EmbeddingProvider, GraphSearcher, RerankProvider, SynthesisProvider,
	VectorSearcher,
};
use braid_providers::embedding::EmbedTask;
use braid_storage::models::{
	ChunkHit, GraphEdgeHit, GraphHit, GraphNodeHit, GraphPathHit, GraphSearch, VectorSearch,
};

pub fn ts(raw: &str) -> OffsetDateTime {
	OffsetDateTime::parse(raw, &Rfc3339).expect("timestamp parse failed")
}

/// Hash-derived embeddings: identical text always maps to the identical vector, distinct
/// texts almost always differ.
pub struct FakeEmbedding {
	pub dimensions: u32,
}
impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
		_task: EmbedTask,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		let dimensions = self.dimensions as usize;
		let text = text.to_string();

		Box::pin(async move { Ok(deterministic_embedding(&text, dimensions)) })
	}
}

pub fn deterministic_embedding(text: &str, dimensions: usize) -> Vec<f32> {
	(0..dimensions)
		.map(|i| {
			let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ (i as u64).wrapping_mul(0x9e37_79b9);

			for byte in text.bytes() {
				hash ^= u64::from(byte);
				hash = hash.wrapping_mul(0x0100_0000_01b3);
			}

			((hash % 2_000) as f32 / 1_000.0) - 1.0
		})
		.collect()
}

#[derive(Default)]
pub struct ScriptedVectorSearcher {
	pub hits: Vec<ChunkHit>,
	pub failure: Option<String>,
	pub delay: Option<Duration>,
}
impl VectorSearcher for ScriptedVectorSearcher {
	fn search(&self, _search: VectorSearch) -> BoxFuture<'_, color_eyre::Result<Vec<ChunkHit>>> {
		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if let Some(message) = &self.failure {
				return Err(eyre::eyre!("{message}"));
			}

			Ok(self.hits.clone())
		})
	}
}

#[derive(Default)]
pub struct ScriptedGraphSearcher {
	pub hits: Vec<GraphHit>,
	pub failure: Option<String>,
	pub delay: Option<Duration>,
}
impl GraphSearcher for ScriptedGraphSearcher {
	fn search(&self, _search: GraphSearch) -> BoxFuture<'_, color_eyre::Result<Vec<GraphHit>>> {
		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if let Some(message) = &self.failure {
				return Err(eyre::eyre!("{message}"));
			}

			Ok(self.hits.clone())
		})
	}
}

#[derive(Default)]
pub struct ScriptedRerank {
	pub scores: Vec<f32>,
	pub failure: Option<String>,
}
impl RerankProvider for ScriptedRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			if let Some(message) = &self.failure {
				return Err(eyre::eyre!("{message}"));
			}

			Ok(self.scores.clone())
		})
	}
}

pub struct ScriptedSynthesizer {
	pub answer: String,
	pub failure: Option<String>,
}
impl SynthesisProvider for ScriptedSynthesizer {
	fn synthesize<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			if let Some(message) = &self.failure {
				return Err(eyre::eyre!("{message}"));
			}

			Ok(self.answer.clone())
		})
	}
}

pub fn chunk_hit(chunk_id: Uuid, text: &str, score: f32) -> ChunkHit {
	ChunkHit {
		chunk_id,
		document_id: None,
		chunk_index: Some(0),
		entity_id: None,
		text: text.to_string(),
		score,
	}
}

pub fn node_hit(node_id: Uuid, name: &str, summary: &str, score: f32) -> GraphHit {
	GraphHit::Node(GraphNodeHit {
		node_id,
		name: name.to_string(),
		summary: if summary.is_empty() { None } else { Some(summary.to_string()) },
		group_id: "test".to_string(),
		score,
		hops_from_center: None,
	})
}

pub fn edge_hit(
	edge_id: Uuid,
	fact: &str,
	score: f32,
	valid_at: Option<OffsetDateTime>,
	invalid_at: Option<OffsetDateTime>,
) -> GraphHit {
	GraphHit::Edge(GraphEdgeHit {
		edge_id,
		relation: "related_to".to_string(),
		fact: Some(fact.to_string()),
		source_node_id: Uuid::new_v4(),
		target_node_id: Uuid::new_v4(),
		source_name: "source".to_string(),
		target_name: "target".to_string(),
		valid_at,
		invalid_at,
		expired_at: None,
		group_id: "test".to_string(),
		score,
		hops_from_center: None,
	})
}

pub fn path_hit(path_id: Uuid, fact: &str, score: f32) -> GraphHit {
	GraphHit::Path(GraphPathHit {
		path_id,
		edge_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
		fact: fact.to_string(),
		score,
	})
}

pub fn test_config(dimensions: u32) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			bind_localhost_only: true,
		},
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://localhost/braid_test".to_string(),
				pool_max_conns: 1,
			},
			qdrant: Qdrant {
				url: "http://localhost:6334".to_string(),
				collection: "braid_test".to_string(),
				vector_dim: dimensions,
			},
		},
		providers: Providers {
			embedding: dummy_embedding_provider(dimensions),
			rerank: dummy_provider(),
			synthesizer: dummy_llm_provider(),
		},
		retrieval: Retrieval {
			top_k: 8,
			candidate_k: 24,
			vector_timeout_ms: 500,
			graph_timeout_ms: 500,
			query_deadline_ms: 2_000,
			traversal_depth: 2,
			history_max_turns: 6,
		},
		fusion: Fusion {
			strategy: "rrf".to_string(),
			rrf_k: 60,
			mmr_lambda: 0.5,
			mmr_sim_threshold: 0.9,
			merge_policy: "separate".to_string(),
		},
		context: ContextBudget { max_items: 8, max_chars: 8_000, excerpt_max_chars: 120 },
		cache: Cache {
			enabled: false,
			ttl_seconds: 300,
			reference_time_bucket_seconds: 60,
			max_entries: 64,
			version: "v1".to_string(),
		},
	}
}

pub fn dummy_embedding_provider(dimensions: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "key".to_string(),
		path: "/embeddings".to_string(),
		model: "test-embed".to_string(),
		dimensions,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn dummy_provider() -> ProviderConfig {
	ProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "key".to_string(),
		path: "/rerank".to_string(),
		model: "test-rerank".to_string(),
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn dummy_llm_provider() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "key".to_string(),
		path: "/chat/completions".to_string(),
		model: "test-llm".to_string(),
		temperature: 0.1,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}
