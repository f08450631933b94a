use std::{collections::HashMap, sync::Mutex};

use serde_json::Value;
use time::OffsetDateTime;

use crate::fusion::FusedEvidenceSet;

const RESULT_CACHE_SCHEMA_VERSION: i32 = 1;

/// Read-through cache of fused evidence sets. One mutex-guarded map, TTL eviction on read,
/// oldest-entry eviction on insert. Reference times are bucketed before keying so adjacent
/// "now" queries can share an entry.
pub struct ResultCache {
	entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
	stored_at: OffsetDateTime,
	set: FusedEvidenceSet,
}

impl ResultCache {
	pub fn new() -> Self {
		Self { entries: Mutex::new(HashMap::new()) }
	}

	pub fn get(
		&self,
		key: &str,
		now: OffsetDateTime,
		ttl_seconds: i64,
	) -> Option<FusedEvidenceSet> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		match entries.get(key) {
			None => None,
			Some(entry) if now - entry.stored_at < time::Duration::seconds(ttl_seconds) => {
				Some(entry.set.clone())
			},
			Some(_) => {
				entries.remove(key);

				None
			},
		}
	}

	pub fn insert(
		&self,
		key: String,
		set: FusedEvidenceSet,
		now: OffsetDateTime,
		max_entries: u32,
	) {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		if entries.len() >= max_entries as usize && !entries.contains_key(&key) {
			let oldest = entries
				.iter()
				.min_by_key(|(_, entry)| entry.stored_at)
				.map(|(key, _)| key.clone());

			if let Some(oldest) = oldest {
				entries.remove(&oldest);
			}
		}

		entries.insert(key, CacheEntry { stored_at: now, set });
	}
}

impl Default for ResultCache {
	fn default() -> Self {
		Self::new()
	}
}

pub fn bucket_reference_time(reference_time: OffsetDateTime, bucket_seconds: i64) -> i64 {
	let ts = reference_time.unix_timestamp();

	ts - ts.rem_euclid(bucket_seconds)
}

pub fn build_result_cache_key(
	cache_version: &str,
	query: &str,
	namespace: &str,
	reference_bucket: i64,
	strategy: &str,
	merge_policy: &str,
	top_k: u32,
) -> Result<String, serde_json::Error> {
	let payload = serde_json::json!({
		"kind": "fused_result",
		"schema_version": RESULT_CACHE_SCHEMA_VERSION,
		"cache_version": cache_version,
		"query": query.trim(),
		"namespace": namespace,
		"reference_bucket": reference_bucket,
		"strategy": strategy,
		"merge_policy": merge_policy,
		"top_k": top_k,
	});

	hash_cache_key(&payload)
}

pub fn hash_cache_key(payload: &Value) -> Result<String, serde_json::Error> {
	let raw = serde_json::to_vec(payload)?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

#[cfg(test)]
mod tests {
	use time::format_description::well_known::Rfc3339;

	use super::*;

	fn ts(raw: &str) -> OffsetDateTime {
		OffsetDateTime::parse(raw, &Rfc3339).expect("timestamp parse failed")
	}

	#[test]
	fn buckets_reference_times() {
		let a = bucket_reference_time(ts("2025-01-01T00:00:10Z"), 60);
		let b = bucket_reference_time(ts("2025-01-01T00:00:50Z"), 60);
		let c = bucket_reference_time(ts("2025-01-01T00:01:10Z"), 60);

		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn keys_are_stable_and_input_sensitive() {
		let a = build_result_cache_key("v1", "q", "ns", 0, "rrf", "separate", 10).unwrap();
		let b = build_result_cache_key("v1", "q", "ns", 0, "rrf", "separate", 10).unwrap();
		let c = build_result_cache_key("v1", "q", "ns", 60, "rrf", "separate", 10).unwrap();

		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn entries_expire_after_ttl() {
		let cache = ResultCache::new();

		cache.insert("k".to_string(), FusedEvidenceSet::default(), ts("2025-01-01T00:00:00Z"), 8);

		assert!(cache.get("k", ts("2025-01-01T00:00:30Z"), 60).is_some());
		assert!(cache.get("k", ts("2025-01-01T00:01:00Z"), 60).is_none());
	}

	#[test]
	fn oldest_entry_is_evicted_at_capacity() {
		let cache = ResultCache::new();

		cache.insert("a".to_string(), FusedEvidenceSet::default(), ts("2025-01-01T00:00:00Z"), 2);
		cache.insert("b".to_string(), FusedEvidenceSet::default(), ts("2025-01-01T00:00:01Z"), 2);
		cache.insert("c".to_string(), FusedEvidenceSet::default(), ts("2025-01-01T00:00:02Z"), 2);

		assert!(cache.get("a", ts("2025-01-01T00:00:03Z"), 60).is_none());
		assert!(cache.get("b", ts("2025-01-01T00:00:03Z"), 60).is_some());
		assert!(cache.get("c", ts("2025-01-01T00:00:03Z"), 60).is_some());
	}
}
