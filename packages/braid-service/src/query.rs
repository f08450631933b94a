use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use braid_domain::{
	evidence::{EvidenceItem, EvidenceOrigin, Metadata},
	temporal::{self, TemporalValidity},
};
use braid_providers::embedding::EmbedTask;
use braid_storage::models::{ChunkHit, GraphHit, GraphSearch, VectorSearch};

use crate::{
	BraidService, ServiceError, ServiceResult,
	assemble::{self, NO_EVIDENCE_SENTINEL, SourceAttribution},
	cache,
	fusion::{self, FusedEvidenceSet, FusionStrategy, MergePolicy},
	normalize,
};

const WARN_RETRIEVAL_FAILED: &str = "retrieval_failed";
const WARN_RETRIEVAL_TIMEOUT: &str = "retrieval_timeout";
const WARN_MALFORMED_INTERVAL: &str = "malformed_interval";
const WARN_RERANK_FAILED: &str = "rerank_failed";

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You answer questions strictly from the provided evidence blocks. Every claim must be \
supported by an evidence block; cite the bracketed source tags you relied on. If the \
evidence does not answer the question, say that it does not.";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationTurn {
	pub role: String,
	pub content: String,
}

/// The full input bundle for one query: the query text, its namespace, an optional
/// point-in-time reference instant (defaults to now), bounded conversation history, and
/// optional per-request overrides of the configured strategy and top-K.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryRequest {
	pub query: String,
	pub namespace: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub reference_time: Option<OffsetDateTime>,
	#[serde(default)]
	pub history: Vec<ConversationTurn>,
	#[serde(default)]
	pub center_entity_id: Option<Uuid>,
	#[serde(default)]
	pub strategy: Option<String>,
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalChannel {
	Vector,
	Graph,
}
impl RetrievalChannel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Graph => "graph",
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryWarning {
	pub channel: Option<RetrievalChannel>,
	pub code: String,
	pub message: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryItemExplain {
	pub vector_rank: Option<u32>,
	pub graph_rank: Option<u32>,
	pub vector_score: Option<f32>,
	pub graph_score: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryItem {
	pub id: Uuid,
	pub origin: EvidenceOrigin,
	pub text: String,
	pub fused_score: f32,
	#[serde(default, with = "crate::time_serde::option")]
	pub valid_at: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub invalid_at: Option<OffsetDateTime>,
	pub metadata: Metadata,
	pub explain: QueryItemExplain,
}

/// The resolved fusion parameters a response was produced under, echoed back for
/// reproducibility.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FusionSnapshot {
	pub strategy: String,
	pub merge_policy: String,
	pub top_k: u32,
	pub rrf_k: u32,
	pub mmr_lambda: f32,
	#[serde(with = "crate::time_serde")]
	pub reference_time: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryResponse {
	pub items: Vec<QueryItem>,
	pub context_text: String,
	pub attributions: Vec<SourceAttribution>,
	pub warnings: Vec<QueryWarning>,
	pub fusion: FusionSnapshot,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnswerResponse {
	/// Absent when no evidence survived retrieval and fusion; synthesis is skipped rather
	/// than prompted over nothing.
	pub answer: Option<String>,
	pub evidence: QueryResponse,
}

impl BraidService {
	/// The primary operation: concurrent vector and graph retrieval, temporal filtering of
	/// graph facts, cross-origin fusion, and context assembly. One failed adapter degrades to
	/// a warning; two failed adapters fail the query.
	pub async fn retrieve_and_fuse(&self, req: QueryRequest) -> ServiceResult<QueryResponse> {
		let query = req.query.trim().to_string();
		let namespace = req.namespace.trim().to_string();

		if query.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must be non-empty.".to_string(),
			});
		}
		if namespace.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "namespace must be non-empty.".to_string(),
			});
		}

		let strategy = resolve_strategy(req.strategy.as_deref(), &self.cfg.fusion.strategy)?;
		let Some(merge_policy) = MergePolicy::resolve(&self.cfg.fusion.merge_policy) else {
			return Err(ServiceError::InvalidRequest {
				message: format!("Unknown merge policy {:?}.", self.cfg.fusion.merge_policy),
			});
		};
		let top_k = req.top_k.unwrap_or(self.cfg.retrieval.top_k).max(1);
		let candidate_k = self.cfg.retrieval.candidate_k.max(top_k);
		let reference_time = req.reference_time.unwrap_or_else(OffsetDateTime::now_utc);
		let snapshot = FusionSnapshot {
			strategy: strategy.as_str().to_string(),
			merge_policy: merge_policy.as_str().to_string(),
			top_k,
			rrf_k: self.cfg.fusion.rrf_k,
			mmr_lambda: self.cfg.fusion.mmr_lambda,
			reference_time,
		};

		let cache_cfg = &self.cfg.cache;
		let cache_key = if cache_cfg.enabled {
			let bucket = cache::bucket_reference_time(
				reference_time,
				cache_cfg.reference_time_bucket_seconds,
			);

			match cache::build_result_cache_key(
				&cache_cfg.version,
				&query,
				&namespace,
				bucket,
				strategy.as_str(),
				merge_policy.as_str(),
				top_k,
			) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(error = %err, "Cache key build failed.");

					None
				},
			}
		} else {
			None
		};

		if let Some(key) = cache_key.as_ref() {
			let now = OffsetDateTime::now_utc();

			if let Some(set) = self.result_cache.get(key, now, cache_cfg.ttl_seconds) {
				tracing::info!(
					cache_key_prefix = cache::cache_key_prefix(key),
					hit = true,
					"Fused result cache hit."
				);

				return Ok(self.build_response(set, Vec::new(), snapshot));
			}
		}

		let embedding = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &query, EmbedTask::Query)
			.await
			.map_err(|err| ServiceError::Embedding { message: err.to_string() })?;

		if embedding.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(ServiceError::Embedding {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let mut warnings = Vec::new();
		let (vector_hits, graph_hits) = self
			.run_retrievals(&query, &embedding, candidate_k, &namespace, req.center_entity_id, &mut warnings)
			.await?;
		let vector_result = fusion::RetrievalResult::vector(
			query.clone(),
			normalize::vector_evidence(&vector_hits.unwrap_or_default()),
		);
		let graph_result = fusion::RetrievalResult::graph(
			query.clone(),
			self.filter_temporal(
				normalize::graph_evidence(&graph_hits.unwrap_or_default()),
				reference_time,
				&mut warnings,
			),
		);
		let candidates = fusion::combine(vector_result, graph_result, merge_policy);
		let fused = match strategy {
			FusionStrategy::Rrf => fusion::fuse_rrf(candidates, self.cfg.fusion.rrf_k, top_k),
			FusionStrategy::Mmr => fusion::fuse_mmr(
				candidates,
				self.cfg.fusion.mmr_lambda,
				self.cfg.fusion.mmr_sim_threshold,
				top_k,
			),
			FusionStrategy::Rerank =>
				self.rerank_passthrough(&query, candidates, top_k, &mut warnings).await,
		};

		// Degraded results are recomputed next time instead of being pinned by the cache.
		if let Some(key) = cache_key
			&& warnings.is_empty()
		{
			let now = OffsetDateTime::now_utc();

			self.result_cache.insert(key, fused.clone(), now, cache_cfg.max_entries);
		}

		Ok(self.build_response(fused, warnings, snapshot))
	}

	/// Runs the core operation, then hands the assembled context to the answer synthesizer.
	/// An empty evidence set short-circuits before the synthesis call.
	pub async fn answer(&self, req: QueryRequest) -> ServiceResult<AnswerResponse> {
		let query = req.query.trim().to_string();
		let history = bound_history(&req.history, self.cfg.retrieval.history_max_turns);
		let evidence = self.retrieve_and_fuse(req).await?;

		if evidence.context_text == NO_EVIDENCE_SENTINEL {
			return Ok(AnswerResponse { answer: None, evidence });
		}

		let messages = build_synthesis_messages(&query, &history, &evidence.context_text);
		let answer = self
			.providers
			.synthesizer
			.synthesize(&self.cfg.providers.synthesizer, &messages)
			.await
			.map_err(|err| ServiceError::Synthesis { message: err.to_string() })?;

		Ok(AnswerResponse { answer: Some(answer), evidence })
	}

	async fn run_retrievals(
		&self,
		query: &str,
		embedding: &[f32],
		candidate_k: u32,
		namespace: &str,
		center_entity_id: Option<Uuid>,
		warnings: &mut Vec<QueryWarning>,
	) -> ServiceResult<(Option<Vec<ChunkHit>>, Option<Vec<GraphHit>>)> {
		// The outer deadline is enforced by clamping each adapter's own timeout; fusion and
		// assembly are pure and add nothing measurable on top.
		let deadline = Duration::from_millis(self.cfg.retrieval.query_deadline_ms);
		let vector_timeout = Duration::from_millis(self.cfg.retrieval.vector_timeout_ms).min(deadline);
		let graph_timeout = Duration::from_millis(self.cfg.retrieval.graph_timeout_ms).min(deadline);
		let vector_search = VectorSearch {
			embedding: embedding.to_vec(),
			top_k: candidate_k,
			namespace: namespace.to_string(),
		};
		let graph_search = GraphSearch {
			query_text: query.to_string(),
			embedding: embedding.to_vec(),
			top_k: candidate_k,
			namespace: namespace.to_string(),
			center_entity_id,
			traversal_depth: self.cfg.retrieval.traversal_depth,
		};
		let (vector_result, graph_result) = tokio::join!(
			tokio::time::timeout(vector_timeout, self.searchers.vector.search(vector_search)),
			tokio::time::timeout(graph_timeout, self.searchers.graph.search(graph_search)),
		);
		let vector_hits = settle(RetrievalChannel::Vector, vector_result, warnings);
		let graph_hits = settle(RetrievalChannel::Graph, graph_result, warnings);

		if vector_hits.is_none() && graph_hits.is_none() {
			return Err(ServiceError::BothRetrievalsFailed {
				vector: channel_failure(warnings, RetrievalChannel::Vector),
				graph: channel_failure(warnings, RetrievalChannel::Graph),
			});
		}

		Ok((vector_hits, graph_hits))
	}

	fn filter_temporal(
		&self,
		items: Vec<EvidenceItem>,
		reference_time: OffsetDateTime,
		warnings: &mut Vec<QueryWarning>,
	) -> Vec<EvidenceItem> {
		let mut out = Vec::with_capacity(items.len());

		for item in items {
			match temporal::classify(&item, reference_time) {
				TemporalValidity::Valid => out.push(item),
				TemporalValidity::Malformed => {
					tracing::warn!(
						element_id = %item.id,
						"Graph fact has a malformed validity interval."
					);
					warnings.push(QueryWarning {
						channel: Some(RetrievalChannel::Graph),
						code: WARN_MALFORMED_INTERVAL.to_string(),
						message: format!(
							"Graph fact {} has a malformed validity interval.",
							item.id
						),
					});
				},
				// Filtered out, not failed. No warning for facts that are simply not valid at
				// the reference instant.
				TemporalValidity::NotYetValid | TemporalValidity::Expired => {},
			}
		}

		out
	}

	async fn rerank_passthrough(
		&self,
		query: &str,
		candidates: Vec<fusion::Candidate>,
		top_k: u32,
		warnings: &mut Vec<QueryWarning>,
	) -> FusedEvidenceSet {
		let docs: Vec<String> =
			candidates.iter().map(|candidate| candidate.item.text.clone()).collect();

		if docs.is_empty() {
			return FusedEvidenceSet::default();
		}

		match self.providers.rerank.rerank(&self.cfg.providers.rerank, query, &docs).await {
			Ok(scores) => fusion::order_by_scores(candidates, &scores, top_k),
			Err(err) => {
				tracing::warn!(error = %err, "External rerank failed; falling back to reciprocal rank fusion.");
				warnings.push(QueryWarning {
					channel: None,
					code: WARN_RERANK_FAILED.to_string(),
					message: format!("External rerank failed: {err}"),
				});

				fusion::fuse_rrf(candidates, self.cfg.fusion.rrf_k, top_k)
			},
		}
	}

	fn build_response(
		&self,
		fused: FusedEvidenceSet,
		warnings: Vec<QueryWarning>,
		snapshot: FusionSnapshot,
	) -> QueryResponse {
		let assembled = assemble::assemble(
			&fused,
			self.cfg.context.max_items,
			self.cfg.context.max_chars,
			self.cfg.context.excerpt_max_chars,
		);
		let items = fused
			.items
			.into_iter()
			.map(|fused_item| QueryItem {
				id: fused_item.item.id,
				origin: fused_item.item.origin,
				text: fused_item.item.text,
				fused_score: fused_item.fused_score,
				valid_at: fused_item.item.valid_at,
				invalid_at: fused_item.item.invalid_at,
				metadata: fused_item.item.metadata,
				explain: QueryItemExplain {
					vector_rank: fused_item.vector_rank,
					graph_rank: fused_item.graph_rank,
					vector_score: fused_item.vector_score,
					graph_score: fused_item.graph_score,
				},
			})
			.collect();

		QueryResponse {
			items,
			context_text: assembled.context_text,
			attributions: assembled.attributions,
			warnings,
			fusion: snapshot,
		}
	}
}

fn resolve_strategy(
	override_raw: Option<&str>,
	configured: &str,
) -> ServiceResult<FusionStrategy> {
	let raw = override_raw.unwrap_or(configured);

	FusionStrategy::resolve(raw).ok_or_else(|| ServiceError::InvalidRequest {
		message: format!("Unknown fusion strategy {raw:?}."),
	})
}

fn settle<T>(
	channel: RetrievalChannel,
	result: Result<color_eyre::Result<Vec<T>>, tokio::time::error::Elapsed>,
	warnings: &mut Vec<QueryWarning>,
) -> Option<Vec<T>> {
	match result {
		Ok(Ok(hits)) => Some(hits),
		Ok(Err(err)) => {
			tracing::warn!(channel = channel.as_str(), error = %err, "Retrieval failed.");
			warnings.push(QueryWarning {
				channel: Some(channel),
				code: WARN_RETRIEVAL_FAILED.to_string(),
				message: format!("{} retrieval failed: {err}", channel.as_str()),
			});

			None
		},
		Err(_) => {
			tracing::warn!(channel = channel.as_str(), "Retrieval timed out.");
			warnings.push(QueryWarning {
				channel: Some(channel),
				code: WARN_RETRIEVAL_TIMEOUT.to_string(),
				message: format!("{} retrieval timed out.", channel.as_str()),
			});

			None
		},
	}
}

fn channel_failure(warnings: &[QueryWarning], channel: RetrievalChannel) -> String {
	warnings
		.iter()
		.find(|warning| warning.channel == Some(channel))
		.map(|warning| warning.message.clone())
		.unwrap_or_else(|| format!("{} retrieval failed.", channel.as_str()))
}

fn bound_history(history: &[ConversationTurn], max_turns: u32) -> Vec<ConversationTurn> {
	let keep = max_turns as usize;

	if history.len() <= keep {
		history.to_vec()
	} else {
		history[history.len() - keep..].to_vec()
	}
}

fn build_synthesis_messages(
	query: &str,
	history: &[ConversationTurn],
	context: &str,
) -> Vec<Value> {
	let mut messages =
		vec![serde_json::json!({ "role": "system", "content": SYNTHESIS_SYSTEM_PROMPT })];

	for turn in history {
		messages.push(serde_json::json!({ "role": turn.role, "content": turn.content }));
	}

	messages.push(serde_json::json!({
		"role": "user",
		"content": format!("{query}\n\nEvidence:\n{context}"),
	}));

	messages
}
