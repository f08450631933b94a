use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use braid_domain::evidence::EvidenceOrigin;

use crate::fusion::FusedEvidenceSet;

/// Returned as the whole context when nothing survives selection, so callers can
/// short-circuit answer synthesis instead of prompting over an empty string.
pub const NO_EVIDENCE_SENTINEL: &str = "NO_EVIDENCE_FOUND";

const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceAttribution {
	pub origin: EvidenceOrigin,
	pub id: Uuid,
	pub excerpt: String,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
	pub context_text: String,
	pub attributions: Vec<SourceAttribution>,
	pub dropped_items: u32,
}

/// Concatenates the top `max_items` fused items with origin-tagged delimiters under a
/// character budget. Truncation drops whole items from the tail; an item's text is never cut
/// inside the context. Attributions parallel the included items one to one.
pub fn assemble(
	set: &FusedEvidenceSet,
	max_items: u32,
	max_chars: u32,
	excerpt_max_chars: u32,
) -> AssembledContext {
	let mut blocks: Vec<String> = Vec::new();
	let mut attributions = Vec::new();
	let mut used_chars = 0_usize;

	for fused in set.items.iter().take(max_items as usize) {
		let block =
			format!("[{} {}]\n{}", fused.item.origin.as_str(), fused.item.id, fused.item.text.trim());
		let separator_chars = if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
		let block_chars = block.chars().count();

		if used_chars + separator_chars + block_chars > max_chars as usize {
			break;
		}

		used_chars += separator_chars + block_chars;

		attributions.push(SourceAttribution {
			origin: fused.item.origin,
			id: fused.item.id,
			excerpt: excerpt(&fused.item.text, excerpt_max_chars as usize),
		});
		blocks.push(block);
	}

	let dropped_items = (set.items.len() - blocks.len()) as u32;
	let context_text = if blocks.is_empty() {
		NO_EVIDENCE_SENTINEL.to_string()
	} else {
		blocks.join(BLOCK_SEPARATOR)
	};

	AssembledContext { context_text, attributions, dropped_items }
}

fn excerpt(text: &str, max_graphemes: usize) -> String {
	let trimmed = text.trim();

	if trimmed.graphemes(true).count() <= max_graphemes {
		return trimmed.to_string();
	}

	let mut out: String = trimmed.graphemes(true).take(max_graphemes).collect();

	out.push('\u{2026}');

	out
}
