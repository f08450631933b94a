pub mod assemble;
pub mod cache;
pub mod fusion;
pub mod normalize;
pub mod query;
pub mod time_serde;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use assemble::{AssembledContext, NO_EVIDENCE_SENTINEL, SourceAttribution};
use braid_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use braid_providers::{embedding, embedding::EmbedTask, rerank, synthesizer};
use braid_storage::{
	db::Db,
	graph,
	models::{ChunkHit, GraphHit, GraphSearch, VectorSearch},
	vector::VectorStore,
};
pub use fusion::{FusedEvidenceSet, FusedItem, FusionStrategy, MergePolicy, RetrievalResult};
pub use query::{
	AnswerResponse, ConversationTurn, FusionSnapshot, QueryItem, QueryItemExplain, QueryRequest,
	QueryResponse, QueryWarning, RetrievalChannel,
};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
		task: EmbedTask,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait SynthesisProvider
where
	Self: Send + Sync,
{
	fn synthesize<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait VectorSearcher
where
	Self: Send + Sync,
{
	fn search(&self, search: VectorSearch) -> BoxFuture<'_, color_eyre::Result<Vec<ChunkHit>>>;
}

pub trait GraphSearcher
where
	Self: Send + Sync,
{
	fn search(&self, search: GraphSearch) -> BoxFuture<'_, color_eyre::Result<Vec<GraphHit>>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Embedding { message: String },
	BothRetrievalsFailed { vector: String, graph: String },
	Synthesis { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub synthesizer: Arc<dyn SynthesisProvider>,
}

#[derive(Clone)]
pub struct Searchers {
	pub vector: Arc<dyn VectorSearcher>,
	pub graph: Arc<dyn GraphSearcher>,
}

pub struct BraidService {
	pub cfg: Config,
	pub providers: Providers,
	pub searchers: Searchers,
	pub(crate) result_cache: cache::ResultCache,
}

struct DefaultProviders;

struct QdrantVectorSearcher {
	store: VectorStore,
}

struct PgGraphSearcher {
	db: Db,
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Embedding { message } => write!(f, "Embedding error: {message}"),
			Self::BothRetrievalsFailed { vector, graph } => {
				write!(f, "Both retrievals failed. vector: {vector} graph: {graph}")
			},
			Self::Synthesis { message } => write!(f, "Synthesis error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
		task: EmbedTask,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text, task))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl SynthesisProvider for DefaultProviders {
	fn synthesize<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(synthesizer::synthesize(cfg, messages))
	}
}

impl VectorSearcher for QdrantVectorSearcher {
	fn search(&self, search: VectorSearch) -> BoxFuture<'_, color_eyre::Result<Vec<ChunkHit>>> {
		Box::pin(async move { Ok(self.store.top_chunks(&search).await?) })
	}
}

impl GraphSearcher for PgGraphSearcher {
	fn search(&self, search: GraphSearch) -> BoxFuture<'_, color_eyre::Result<Vec<GraphHit>>> {
		Box::pin(async move { Ok(graph::hybrid_search(&self.db.pool, &search).await?) })
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		synthesizer: Arc<dyn SynthesisProvider>,
	) -> Self {
		Self { embedding, rerank, synthesizer }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), synthesizer: provider }
	}
}

impl Searchers {
	pub fn new(vector: Arc<dyn VectorSearcher>, graph: Arc<dyn GraphSearcher>) -> Self {
		Self { vector, graph }
	}

	pub fn for_stores(db: Db, store: VectorStore) -> Self {
		Self {
			vector: Arc::new(QdrantVectorSearcher { store }),
			graph: Arc::new(PgGraphSearcher { db }),
		}
	}
}

impl BraidService {
	pub fn new(cfg: Config, db: Db, store: VectorStore) -> Self {
		let searchers = Searchers::for_stores(db, store);

		Self::with_collaborators(cfg, Providers::default(), searchers)
	}

	pub fn with_collaborators(cfg: Config, providers: Providers, searchers: Searchers) -> Self {
		Self { cfg, providers, searchers, result_cache: cache::ResultCache::new() }
	}
}
