//! Section parser for raw reasoning-backend output.
//!
//! The backend is asked for five labeled sections but enforces nothing, so
//! parsing happens in two passes over untrusted free text: a line-oriented
//! finite-state machine keyed on recognized section headers, then permissive
//! multi-line regexes for any field the state machine left empty. The result
//! is an untyped bag of optionals; defaults are applied in one place by the
//! materialization step downstream.

use regex::Regex;

/// States of the section parser. One state per labeled section plus `Idle`
/// for free text outside any section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    RootCause,
    Category,
    Reasoning,
    Recommendations,
    Patch,
}

/// Fields recovered from the raw response. Everything is optional; nothing
/// here has had defaults applied.
#[derive(Debug, Default, Clone)]
pub struct RawDiagnosis {
    pub root_cause: Option<String>,
    pub category_label: Option<String>,
    pub reasoning: Option<String>,
    pub recommendations: Vec<String>,
    pub patch_lines: Vec<String>,
    /// Non-header lines outside an owning section; used as the reasoning
    /// fallback when no explicit `Reasoning:` section was seen.
    pub free_text: Vec<String>,
}

/// Header transition table: recognized prefix (lower-case) to target state.
/// Tested in order; first match wins.
const HEADERS: &[(&str, ParseState)] = &[
    ("root cause:", ParseState::RootCause),
    ("rca category:", ParseState::Category),
    ("category:", ParseState::Category),
    ("reasoning:", ParseState::Reasoning),
    ("recommendations:", ParseState::Recommendations),
    ("patch:", ParseState::Patch),
    ("suggested manifest patch:", ParseState::Patch),
];

fn classify(line: &str) -> Option<(ParseState, String)> {
    let low = line.to_lowercase();
    for (prefix, state) in HEADERS {
        if low.starts_with(prefix) {
            let inline = line[prefix.len()..].trim().to_string();
            return Some((*state, inline));
        }
    }
    None
}

/// First pass: line-oriented state machine.
#[must_use]
pub fn parse_sections(text: &str) -> RawDiagnosis {
    let mut raw = RawDiagnosis::default();
    let mut state = ParseState::Idle;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((next, inline)) = classify(line) {
            match next {
                // Single-line sections capture inline text and release the
                // state; their continuation lines are free text.
                ParseState::RootCause => {
                    raw.root_cause = Some(inline).filter(|s| !s.is_empty());
                    state = ParseState::Idle;
                }
                ParseState::Category => {
                    raw.category_label = Some(inline).filter(|s| !s.is_empty());
                    state = ParseState::Idle;
                }
                ParseState::Reasoning => {
                    raw.reasoning = Some(inline).filter(|s| !s.is_empty());
                    if let Some(r) = &raw.reasoning {
                        raw.free_text.push(r.clone());
                    }
                    state = ParseState::Reasoning;
                }
                ParseState::Recommendations | ParseState::Patch => {
                    state = next;
                }
                ParseState::Idle => unreachable!("Idle is never a header target"),
            }
            continue;
        }

        match state {
            ParseState::Recommendations if line.starts_with("- ") => {
                let rec = line[2..].trim();
                // Bullet lines that look like YAML keys are stray patch
                // fragments, not recommendations.
                if !rec.is_empty() && !rec.to_lowercase().starts_with("name:") {
                    raw.recommendations.push(rec.to_string());
                }
            }
            ParseState::Patch => {
                raw.patch_lines.push(line.to_string());
            }
            _ => {
                raw.free_text.push(line.to_string());
            }
        }
    }

    raw
}

/// Second pass: permissive multi-line extraction anchored on the section
/// label and terminated by the next known label or end of text. Only fills
/// fields the state machine left empty.
pub fn regex_fill(raw: &mut RawDiagnosis, text: &str) {
    if raw.root_cause.is_none() {
        let re = Regex::new(r"(?is)root\s*cause\s*:\s*(.*?)(?:reasoning:|recommendations:|patch:|$)")
            .expect("hardcoded regex");
        raw.root_cause = re
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());
    }

    if raw.reasoning.is_none() {
        let re = Regex::new(r"(?is)reasoning\s*:\s*(.*?)(?:recommendations:|patch:|$)")
            .expect("hardcoded regex");
        let captured = re
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());
        raw.reasoning = captured.or_else(|| {
            let joined = raw.free_text.join("\n").trim().to_string();
            Some(joined).filter(|s| !s.is_empty())
        });
    }

    if raw.recommendations.is_empty() {
        let re = Regex::new(r"-\s+([^\n]+)").expect("hardcoded regex");
        raw.recommendations = re
            .captures_iter(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

/// One-line root cause extraction used on the retry response.
#[must_use]
pub fn retry_root_cause(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)root\s*cause\s*:\s*(.*)").expect("hardcoded regex");
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Bullet extraction used on the retry response.
#[must_use]
pub fn retry_recommendations(text: &str) -> Vec<String> {
    let re = Regex::new(r"-\s+(.*)").expect("hardcoded regex");
    re.captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
