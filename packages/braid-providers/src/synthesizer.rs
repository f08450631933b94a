use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Calls the chat-completions-shaped synthesis endpoint with pre-built messages and returns
/// the assistant's answer text. Message assembly is the caller's concern; this function is
/// strictly transport plus response parsing.
pub async fn synthesize(
	cfg: &braid_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_synthesis_response(json)
}

fn parse_synthesis_response(json: Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Synthesis response is missing message content."))?;
	let trimmed = content.trim();

	if trimmed.is_empty() {
		return Err(eyre::eyre!("Synthesis response content is empty."));
	}

	Ok(trimmed.to_string())
}
