//! Patch extraction and cleanup.
//!
//! Backends frequently repeat the manifest patch - once in the `Patch:`
//! section and again in a fenced code block, sometimes twice with small
//! variations. This module extracts candidate fragments, strips fences,
//! deduplicates lines while preserving first-seen order, and collapses
//! multiple top-level `spec:` blocks down to the longest one. The cleanup is
//! idempotent.

use regex::Regex;

/// Sentinel meaning "no manifest change required".
pub const PATCH_NONE: &str = "# none";

/// Extract fenced code blocks that look like manifest fragments.
///
/// A block qualifies only if it contains at least one manifest-shaped
/// keyword; prose samples and shell snippets are dropped.
#[must_use]
pub fn extract_manifest_blocks(text: &str) -> Vec<String> {
    let fence = Regex::new(r"(?is)```(?:yaml)?\s*(.*?)```").expect("hardcoded regex");
    let keyword =
        Regex::new(r"\b(spec|containers|image|metadata|apiVersion)\b").expect("hardcoded regex");

    fence
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|block| keyword.is_match(block))
        .collect()
}

/// Clean a combined patch: strip fences, dedup lines, keep the longest
/// `spec:` block when several remain, and normalize the empty/none cases to
/// the [`PATCH_NONE`] sentinel.
#[must_use]
pub fn clean_patch(raw: &str) -> String {
    let mut patch = raw.trim().to_string();

    let yaml_fence = Regex::new(r"```+yaml").expect("hardcoded regex");
    let fence = Regex::new(r"```+").expect("hardcoded regex");
    patch = yaml_fence.replace_all(&patch, "").to_string();
    patch = fence.replace_all(&patch, "").to_string();

    // Deduplicate identical lines, first occurrence wins
    let mut seen = std::collections::HashSet::new();
    let mut clean_lines = Vec::new();
    for line in patch.lines() {
        if seen.insert(line.trim().to_string()) {
            clean_lines.push(line);
        }
    }
    patch = clean_lines.join("\n").trim().to_string();

    // Multiple top-level spec blocks: keep only the longest
    let blocks = spec_blocks(&patch);
    if blocks.len() > 1 {
        if let Some(longest) = blocks.iter().max_by_key(|b| b.len()) {
            patch = longest.trim().to_string();
        }
    }

    let low = patch.to_lowercase();
    if patch.is_empty() || low == "# none" || low == "none" {
        PATCH_NONE.to_string()
    } else {
        patch
    }
}

/// Split out top-level `spec:` blocks: each starts at a non-indented
/// `spec:` line and runs through the indented lines that follow, ending at
/// the next non-indented line.
fn spec_blocks(patch: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in patch.lines() {
        if line.starts_with("spec:") {
            if let Some(block) = current.take() {
                blocks.push(block.join("\n"));
            }
            current = Some(vec![line]);
        } else if line.is_empty() || line.starts_with(char::is_whitespace) {
            if let Some(block) = current.as_mut() {
                block.push(line);
            }
        } else if let Some(block) = current.take() {
            blocks.push(block.join("\n"));
        }
    }
    if let Some(block) = current {
        blocks.push(block.join("\n"));
    }

    blocks
}
