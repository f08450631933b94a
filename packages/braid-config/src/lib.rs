mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, ContextBudget, EmbeddingProviderConfig, Fusion, LlmProviderConfig, Postgres,
	ProviderConfig, Providers, Qdrant, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.candidate_k < cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be at least retrieval.top_k.".to_string(),
		});
	}
	for (label, value) in [
		("retrieval.vector_timeout_ms", cfg.retrieval.vector_timeout_ms),
		("retrieval.graph_timeout_ms", cfg.retrieval.graph_timeout_ms),
		("retrieval.query_deadline_ms", cfg.retrieval.query_deadline_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}
	if cfg.retrieval.traversal_depth > 4 {
		return Err(Error::Validation {
			message: "retrieval.traversal_depth must be 4 or less.".to_string(),
		});
	}

	let strategy = cfg.fusion.strategy.as_str();

	if !matches!(strategy, "rrf" | "mmr" | "rerank") {
		return Err(Error::Validation {
			message: "fusion.strategy must be one of rrf, mmr, or rerank.".to_string(),
		});
	}
	if cfg.fusion.rrf_k == 0 {
		return Err(Error::Validation {
			message: "fusion.rrf_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.fusion.mmr_lambda.is_finite() || !(0.0..=1.0).contains(&cfg.fusion.mmr_lambda) {
		return Err(Error::Validation {
			message: "fusion.mmr_lambda must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.fusion.mmr_sim_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.fusion.mmr_sim_threshold)
	{
		return Err(Error::Validation {
			message: "fusion.mmr_sim_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !matches!(cfg.fusion.merge_policy.as_str(), "separate" | "merge") {
		return Err(Error::Validation {
			message: "fusion.merge_policy must be one of separate or merge.".to_string(),
		});
	}
	if cfg.context.max_items == 0 {
		return Err(Error::Validation {
			message: "context.max_items must be greater than zero.".to_string(),
		});
	}
	if cfg.context.max_chars == 0 {
		return Err(Error::Validation {
			message: "context.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.context.excerpt_max_chars == 0
		|| cfg.context.excerpt_max_chars > cfg.context.max_chars
	{
		return Err(Error::Validation {
			message: "context.excerpt_max_chars must be between one and context.max_chars."
				.to_string(),
		});
	}
	if cfg.cache.enabled {
		if cfg.cache.ttl_seconds <= 0 {
			return Err(Error::Validation {
				message: "cache.ttl_seconds must be greater than zero.".to_string(),
			});
		}
		if cfg.cache.reference_time_bucket_seconds <= 0 {
			return Err(Error::Validation {
				message: "cache.reference_time_bucket_seconds must be greater than zero."
					.to_string(),
			});
		}
		if cfg.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "cache.max_entries must be greater than zero.".to_string(),
			});
		}
		if cfg.cache.version.trim().is_empty() {
			return Err(Error::Validation {
				message: "cache.version must be non-empty.".to_string(),
			});
		}
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("synthesizer", &cfg.providers.synthesizer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.fusion.strategy = cfg.fusion.strategy.trim().to_lowercase();
	cfg.fusion.merge_policy = cfg.fusion.merge_policy.trim().to_lowercase();
}
