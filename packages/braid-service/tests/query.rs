use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};

use uuid::Uuid;

use braid_service::{
	BoxFuture, BraidService, NO_EVIDENCE_SENTINEL, Providers, QueryRequest, Searchers,
	ServiceError, VectorSearcher,
};
use braid_storage::models::{ChunkHit, VectorSearch};
use braid_testkit::{
	FakeEmbedding, ScriptedGraphSearcher, ScriptedRerank, ScriptedSynthesizer,
	ScriptedVectorSearcher, chunk_hit, edge_hit, node_hit, test_config, ts,
};

const DIMENSIONS: u32 = 8;

fn service_with(
	cfg: braid_config::Config,
	vector: ScriptedVectorSearcher,
	graph: ScriptedGraphSearcher,
) -> BraidService {
	let providers = Providers::new(
		Arc::new(FakeEmbedding { dimensions: DIMENSIONS }),
		Arc::new(ScriptedRerank::default()),
		Arc::new(ScriptedSynthesizer { answer: "grounded answer".to_string(), failure: None }),
	);
	let searchers = Searchers::new(Arc::new(vector), Arc::new(graph));

	BraidService::with_collaborators(cfg, providers, searchers)
}

fn request(query: &str) -> QueryRequest {
	QueryRequest {
		query: query.to_string(),
		namespace: "test".to_string(),
		reference_time: Some(ts("2025-01-01T00:00:00Z")),
		history: Vec::new(),
		center_entity_id: None,
		strategy: None,
		top_k: None,
	}
}

/// A vector searcher that counts invocations, for observing cache read-through behavior.
struct CountingVector {
	hits: Vec<ChunkHit>,
	calls: Arc<AtomicU32>,
}
impl VectorSearcher for CountingVector {
	fn search(&self, _search: VectorSearch) -> BoxFuture<'_, color_eyre::Result<Vec<ChunkHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.hits.clone()) })
	}
}

#[tokio::test]
async fn temporal_filter_excludes_not_yet_valid_facts_without_warning() {
	// The worked example: c1/c2 from the vector store, e1 valid since 2020, e2 valid only
	// from 2030. At a 2025 reference instant e2 must vanish silently.
	let (c1, c2, e1, e2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
	let vector = ScriptedVectorSearcher {
		hits: vec![chunk_hit(c1, "chunk one", 0.9), chunk_hit(c2, "chunk two", 0.7)],
		..Default::default()
	};
	let graph = ScriptedGraphSearcher {
		hits: vec![
			edge_hit(e1, "fact one", 0.8, Some(ts("2020-01-01T00:00:00Z")), None),
			edge_hit(e2, "fact two", 0.85, Some(ts("2030-01-01T00:00:00Z")), None),
		],
		..Default::default()
	};
	let service = service_with(test_config(DIMENSIONS), vector, graph);
	let response = service.retrieve_and_fuse(request("what happened")).await.expect("query failed");
	let ids: Vec<Uuid> = response.items.iter().map(|item| item.id).collect();

	assert!(ids.contains(&c1));
	assert!(ids.contains(&c2));
	assert!(ids.contains(&e1));
	assert!(!ids.contains(&e2));
	assert!(response.warnings.is_empty());
	assert!(response.attributions.iter().all(|attribution| attribution.id != e2));
}

#[tokio::test]
async fn fused_output_has_no_duplicate_ids() {
	let shared = Uuid::new_v4();
	let vector = ScriptedVectorSearcher {
		hits: vec![chunk_hit(shared, "shared element", 0.9)],
		..Default::default()
	};
	let graph = ScriptedGraphSearcher {
		hits: vec![node_hit(shared, "shared element", "summary", 0.8)],
		..Default::default()
	};
	let service = service_with(test_config(DIMENSIONS), vector, graph);
	let response = service.retrieve_and_fuse(request("dedup")).await.expect("query failed");
	let mut seen = HashSet::new();

	for item in &response.items {
		assert!(seen.insert(item.id), "duplicate id {} in fused output", item.id);
	}

	// Cross-channel agreement is recorded on the single surviving record.
	let item = response.items.iter().find(|item| item.id == shared).expect("shared item missing");

	assert!(item.explain.vector_rank.is_some());
	assert!(item.explain.graph_rank.is_some());
}

#[tokio::test]
async fn identical_inputs_fuse_identically() {
	let hits = vec![
		chunk_hit(Uuid::new_v4(), "alpha", 0.9),
		chunk_hit(Uuid::new_v4(), "beta", 0.8),
		chunk_hit(Uuid::new_v4(), "gamma", 0.7),
	];
	let edges = vec![
		edge_hit(Uuid::new_v4(), "delta fact", 0.6, None, None),
		edge_hit(Uuid::new_v4(), "epsilon fact", 0.5, None, None),
	];
	let build = || {
		service_with(
			test_config(DIMENSIONS),
			ScriptedVectorSearcher { hits: hits.clone(), ..Default::default() },
			ScriptedGraphSearcher { hits: edges.clone(), ..Default::default() },
		)
	};
	let first = build().retrieve_and_fuse(request("stable")).await.expect("query failed");
	let second = build().retrieve_and_fuse(request("stable")).await.expect("query failed");
	let first_ids: Vec<Uuid> = first.items.iter().map(|item| item.id).collect();
	let second_ids: Vec<Uuid> = second.items.iter().map(|item| item.id).collect();

	assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn one_failed_adapter_degrades_to_a_warning() {
	let edges = vec![
		edge_hit(Uuid::new_v4(), "surviving fact one", 0.8, None, None),
		edge_hit(Uuid::new_v4(), "surviving fact two", 0.6, None, None),
	];
	let vector = ScriptedVectorSearcher {
		failure: Some("connection refused".to_string()),
		..Default::default()
	};
	let graph = ScriptedGraphSearcher { hits: edges.clone(), ..Default::default() };
	let service = service_with(test_config(DIMENSIONS), vector, graph);
	let response = service.retrieve_and_fuse(request("resilience")).await.expect("query failed");

	assert!(response.items.len() <= edges.len());
	assert!(!response.items.is_empty());
	assert!(response.warnings.iter().any(|warning| warning.code == "retrieval_failed"));
	assert!(response.items.iter().all(|item| item.explain.vector_rank.is_none()));
}

#[tokio::test]
async fn slow_adapter_times_out_and_the_other_stream_survives() {
	let mut cfg = test_config(DIMENSIONS);

	cfg.retrieval.vector_timeout_ms = 50;

	let vector = ScriptedVectorSearcher {
		hits: vec![chunk_hit(Uuid::new_v4(), "too late", 0.9)],
		delay: Some(Duration::from_millis(300)),
		..Default::default()
	};
	let graph = ScriptedGraphSearcher {
		hits: vec![edge_hit(Uuid::new_v4(), "on time", 0.8, None, None)],
		..Default::default()
	};
	let service = service_with(cfg, vector, graph);
	let response = service.retrieve_and_fuse(request("deadline")).await.expect("query failed");

	assert_eq!(response.items.len(), 1);
	assert!(response.warnings.iter().any(|warning| warning.code == "retrieval_timeout"));
}

#[tokio::test]
async fn both_adapters_failing_fails_the_query() {
	let vector =
		ScriptedVectorSearcher { failure: Some("down".to_string()), ..Default::default() };
	let graph = ScriptedGraphSearcher { failure: Some("down".to_string()), ..Default::default() };
	let service = service_with(test_config(DIMENSIONS), vector, graph);
	let err = service.retrieve_and_fuse(request("nothing left")).await.expect_err("should fail");

	assert!(matches!(err, ServiceError::BothRetrievalsFailed { .. }));
}

#[tokio::test]
async fn empty_stores_are_a_successful_empty_result_not_an_error() {
	let service = service_with(
		test_config(DIMENSIONS),
		ScriptedVectorSearcher::default(),
		ScriptedGraphSearcher::default(),
	);
	let response = service.retrieve_and_fuse(request("nothing matches")).await.expect("query failed");

	assert!(response.items.is_empty());
	assert_eq!(response.context_text, NO_EVIDENCE_SENTINEL);
	assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn rerank_strategy_orders_by_provider_scores() {
	let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
	let mut cfg = test_config(DIMENSIONS);

	cfg.fusion.strategy = "rerank".to_string();

	let providers = Providers::new(
		Arc::new(FakeEmbedding { dimensions: DIMENSIONS }),
		// The retrieval-order winner gets the lower score, forcing a reorder.
		Arc::new(ScriptedRerank { scores: vec![0.1, 0.9], failure: None }),
		Arc::new(ScriptedSynthesizer { answer: "unused".to_string(), failure: None }),
	);
	let searchers = Searchers::new(
		Arc::new(ScriptedVectorSearcher {
			hits: vec![chunk_hit(a, "first retrieved", 0.9), chunk_hit(b, "second retrieved", 0.8)],
			..Default::default()
		}),
		Arc::new(ScriptedGraphSearcher::default()),
	);
	let service = BraidService::with_collaborators(cfg, providers, searchers);
	let response = service.retrieve_and_fuse(request("rerank me")).await.expect("query failed");

	assert_eq!(response.items[0].id, b);
	assert_eq!(response.items[1].id, a);
}

#[tokio::test]
async fn rerank_failure_falls_back_to_rrf_with_a_warning() {
	let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
	let mut cfg = test_config(DIMENSIONS);

	cfg.fusion.strategy = "rerank".to_string();

	let providers = Providers::new(
		Arc::new(FakeEmbedding { dimensions: DIMENSIONS }),
		Arc::new(ScriptedRerank { scores: Vec::new(), failure: Some("quota".to_string()) }),
		Arc::new(ScriptedSynthesizer { answer: "unused".to_string(), failure: None }),
	);
	let searchers = Searchers::new(
		Arc::new(ScriptedVectorSearcher {
			hits: vec![chunk_hit(a, "first", 0.9), chunk_hit(b, "second", 0.8)],
			..Default::default()
		}),
		Arc::new(ScriptedGraphSearcher::default()),
	);
	let service = BraidService::with_collaborators(cfg, providers, searchers);
	let response = service.retrieve_and_fuse(request("degrade")).await.expect("query failed");

	// RRF order is retrieval order here.
	assert_eq!(response.items[0].id, a);
	assert!(response.warnings.iter().any(|warning| warning.code == "rerank_failed"));
}

#[tokio::test]
async fn cache_read_through_skips_retrieval_on_the_second_call() {
	let mut cfg = test_config(DIMENSIONS);

	cfg.cache.enabled = true;

	let calls = Arc::new(AtomicU32::new(0));
	let providers = Providers::new(
		Arc::new(FakeEmbedding { dimensions: DIMENSIONS }),
		Arc::new(ScriptedRerank::default()),
		Arc::new(ScriptedSynthesizer { answer: "unused".to_string(), failure: None }),
	);
	let searchers = Searchers::new(
		Arc::new(CountingVector {
			hits: vec![chunk_hit(Uuid::new_v4(), "cached", 0.9)],
			calls: calls.clone(),
		}),
		Arc::new(ScriptedGraphSearcher::default()),
	);
	let service = BraidService::with_collaborators(cfg, providers, searchers);

	let first = service.retrieve_and_fuse(request("cache me")).await.expect("query failed");
	let second = service.retrieve_and_fuse(request("cache me")).await.expect("query failed");

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(
		first.items.iter().map(|item| item.id).collect::<Vec<_>>(),
		second.items.iter().map(|item| item.id).collect::<Vec<_>>(),
	);
}

#[tokio::test]
async fn answer_short_circuits_on_empty_evidence() {
	let providers = Providers::new(
		Arc::new(FakeEmbedding { dimensions: DIMENSIONS }),
		Arc::new(ScriptedRerank::default()),
		// A synthesizer scripted to fail proves it is never invoked on the empty path.
		Arc::new(ScriptedSynthesizer {
			answer: String::new(),
			failure: Some("must not be called".to_string()),
		}),
	);
	let searchers = Searchers::new(
		Arc::new(ScriptedVectorSearcher::default()),
		Arc::new(ScriptedGraphSearcher::default()),
	);
	let service = BraidService::with_collaborators(test_config(DIMENSIONS), providers, searchers);
	let response = service.answer(request("anything at all")).await.expect("answer failed");

	assert!(response.answer.is_none());
	assert_eq!(response.evidence.context_text, NO_EVIDENCE_SENTINEL);
}

#[tokio::test]
async fn answer_synthesizes_over_assembled_evidence() {
	let vector = ScriptedVectorSearcher {
		hits: vec![chunk_hit(Uuid::new_v4(), "the sky is blue", 0.9)],
		..Default::default()
	};
	let service =
		service_with(test_config(DIMENSIONS), vector, ScriptedGraphSearcher::default());
	let response = service.answer(request("what color is the sky")).await.expect("answer failed");

	assert_eq!(response.answer.as_deref(), Some("grounded answer"));
	assert_eq!(response.evidence.attributions.len(), 1);
}

#[tokio::test]
async fn blank_query_is_rejected() {
	let service = service_with(
		test_config(DIMENSIONS),
		ScriptedVectorSearcher::default(),
		ScriptedGraphSearcher::default(),
	);
	let err =
		service.retrieve_and_fuse(request("   ")).await.expect_err("blank query should fail");

	assert!(matches!(err, ServiceError::InvalidRequest { .. }));
}
