use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use braid_domain::{
	evidence::{EvidenceItem, EvidenceOrigin, Metadata, MetadataValue},
	temporal::{TemporalValidity, classify, is_currently_valid},
};

fn ts(raw: &str) -> OffsetDateTime {
	OffsetDateTime::parse(raw, &Rfc3339).expect("timestamp parse failed")
}

fn edge(valid_at: Option<&str>, invalid_at: Option<&str>) -> EvidenceItem {
	EvidenceItem {
		id: Uuid::new_v4(),
		origin: EvidenceOrigin::GraphEdge,
		text: "alice works at acme".to_string(),
		score: 0.8,
		rank: 1,
		valid_at: valid_at.map(ts),
		invalid_at: invalid_at.map(ts),
		expired: false,
		metadata: Metadata::new(),
	}
}

fn chunk() -> EvidenceItem {
	EvidenceItem {
		id: Uuid::new_v4(),
		origin: EvidenceOrigin::VectorChunk,
		text: "chunk".to_string(),
		score: 0.9,
		rank: 1,
		valid_at: None,
		invalid_at: None,
		expired: false,
		metadata: Metadata::new(),
	}
}

#[test]
fn vector_chunks_have_no_temporal_semantics() {
	let reference = ts("2025-01-01T00:00:00Z");

	assert!(is_currently_valid(&chunk(), reference));
}

#[test]
fn unstamped_graph_facts_are_always_valid() {
	let reference = ts("2025-01-01T00:00:00Z");

	assert!(is_currently_valid(&edge(None, None), reference));
}

#[test]
fn open_ended_interval_is_valid_after_start() {
	let reference = ts("2025-01-01T00:00:00Z");

	assert!(is_currently_valid(&edge(Some("2020-01-01T00:00:00Z"), None), reference));
}

#[test]
fn future_fact_is_not_yet_valid() {
	let reference = ts("2025-01-01T00:00:00Z");
	let item = edge(Some("2030-01-01T00:00:00Z"), None);

	assert_eq!(classify(&item, reference), TemporalValidity::NotYetValid);
	assert!(!is_currently_valid(&item, reference));
}

#[test]
fn closed_interval_expires_at_invalid_at() {
	let item = edge(Some("2020-01-01T00:00:00Z"), Some("2024-01-01T00:00:00Z"));

	assert!(is_currently_valid(&item, ts("2023-12-31T23:59:59Z")));
	assert_eq!(classify(&item, ts("2024-01-01T00:00:00Z")), TemporalValidity::Expired);
}

#[test]
fn validity_starts_exactly_at_valid_at() {
	let item = edge(Some("2020-01-01T00:00:00Z"), None);

	assert!(is_currently_valid(&item, ts("2020-01-01T00:00:00Z")));
}

#[test]
fn marked_expired_overrides_interval() {
	let mut item = edge(Some("2020-01-01T00:00:00Z"), None);

	item.expired = true;

	assert_eq!(classify(&item, ts("2025-01-01T00:00:00Z")), TemporalValidity::Expired);
}

#[test]
fn inverted_interval_is_malformed_not_a_panic() {
	let item = edge(Some("2024-01-01T00:00:00Z"), Some("2020-01-01T00:00:00Z"));

	assert_eq!(classify(&item, ts("2025-01-01T00:00:00Z")), TemporalValidity::Malformed);
	assert!(!is_currently_valid(&item, ts("2025-01-01T00:00:00Z")));
}

#[test]
fn zero_length_interval_is_malformed() {
	let item = edge(Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:00Z"));

	assert_eq!(classify(&item, ts("2025-01-01T00:00:00Z")), TemporalValidity::Malformed);
}

#[test]
fn metadata_values_serialize_as_flat_json() {
	let mut metadata = Metadata::new();

	metadata.insert("chunk_index".to_string(), MetadataValue::Integer(3));
	metadata.insert("source_document_id".to_string(), MetadataValue::from("doc-1"));

	let json = serde_json::to_value(&metadata).expect("serialize failed");

	assert_eq!(json["chunk_index"], serde_json::json!(3));
	assert_eq!(json["source_document_id"], serde_json::json!("doc-1"));
}
