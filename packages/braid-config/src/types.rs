use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub fusion: Fusion,
	pub context: ContextBudget,
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	pub bind_localhost_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub synthesizer: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// Knobs for the two retrieval adapters and the per-query time budget.
#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub top_k: u32,
	pub candidate_k: u32,
	pub vector_timeout_ms: u64,
	pub graph_timeout_ms: u64,
	pub query_deadline_ms: u64,
	pub traversal_depth: u32,
	pub history_max_turns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Fusion {
	/// One of "rrf", "mmr", or "rerank".
	pub strategy: String,
	pub rrf_k: u32,
	pub mmr_lambda: f32,
	pub mmr_sim_threshold: f32,
	/// One of "separate" or "merge".
	pub merge_policy: String,
}

#[derive(Debug, Deserialize)]
pub struct ContextBudget {
	pub max_items: u32,
	pub max_chars: u32,
	pub excerpt_max_chars: u32,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	pub ttl_seconds: i64,
	pub reference_time_bucket_seconds: i64,
	pub max_entries: u32,
	pub version: String,
}
