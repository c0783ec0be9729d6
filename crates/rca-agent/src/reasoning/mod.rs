//! Reasoning pipeline: prompt, backend calls, parsing, and one bounded
//! smart retry.
//!
//! `diagnose` never fails. Backend errors degrade through a fallback model,
//! then through sentinel text; parsing ambiguity degrades through regex
//! extraction, then through defaults. The caller always receives a fully
//! populated [`Diagnosis`].

pub mod client;
pub mod parser;
pub mod patch;
pub mod prompt;

use tracing::{debug, info, warn};

use crate::types::{Category, DiagnosticBundle, Diagnosis, ResourceRef};
pub use client::{GeminiClient, ReasoningError, FALLBACK_MODEL, PRIMARY_MODEL};

/// Pause before the smart-retry call, to avoid hammering the backend
/// immediately after a weak response.
const RETRY_PAUSE: std::time::Duration = std::time::Duration::from_secs(2);

/// Reasoning client with multi-model fallback and defensive parsing.
pub struct ReasoningClient {
    gemini: GeminiClient,
    primary_model: String,
    fallback_model: String,
}

impl ReasoningClient {
    /// Wrap a backend client with the default primary/fallback model pair.
    #[must_use]
    pub fn new(gemini: GeminiClient) -> Self {
        Self {
            gemini,
            primary_model: PRIMARY_MODEL.to_string(),
            fallback_model: FALLBACK_MODEL.to_string(),
        }
    }

    /// Override the model pair.
    #[must_use]
    pub fn with_models(
        mut self,
        primary: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        self.primary_model = primary.into();
        self.fallback_model = fallback.into();
        self
    }

    /// Produce a structured diagnosis for one resource. Never fails.
    pub async fn diagnose(
        &self,
        resource: &ResourceRef,
        bundle: &DiagnosticBundle,
        metrics_summary: &str,
        signals: &str,
    ) -> Diagnosis {
        let prompt = prompt::build_prompt(resource, bundle, metrics_summary, signals);

        let text = match self.gemini.generate(&self.primary_model, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(model = %self.primary_model, error = %e, "Primary model failed, retrying with fallback model");
                match self.gemini.generate(&self.fallback_model, &prompt).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(model = %self.fallback_model, error = %e, "Fallback model failed too");
                        String::new()
                    }
                }
            }
        };

        debug!(%resource, response_len = text.len(), "Raw RCA output received");

        let mut diagnosis = parse_response(&text);

        if needs_retry(&diagnosis) {
            info!(%resource, "RCA result too weak, retrying with refined prompt");
            tokio::time::sleep(RETRY_PAUSE).await;

            let refined = prompt::build_retry_prompt(resource, bundle, metrics_summary, signals);
            match self.gemini.generate(&self.fallback_model, &refined).await {
                Ok(retry_text) => apply_retry(&mut diagnosis, &retry_text),
                Err(e) => {
                    warn!(error = %e, "Retry call failed");
                    apply_retry(&mut diagnosis, "");
                }
            }
        }

        finalize(&mut diagnosis);
        diagnosis
    }
}

/// Parse a raw backend response into a diagnosis, without final default
/// fill. Pure: unit-testable independent of the network call.
#[must_use]
pub(crate) fn parse_response(text: &str) -> Diagnosis {
    let mut raw = parser::parse_sections(text);
    parser::regex_fill(&mut raw, text);

    // Fenced blocks are appended after the section-captured patch lines;
    // the line-level dedup in clean_patch absorbs the overlap.
    let mut patch_fragments = raw.patch_lines.clone();
    patch_fragments.extend(patch::extract_manifest_blocks(text));
    let combined = patch_fragments
        .iter()
        .filter(|f| !f.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");
    let patch = patch::clean_patch(&combined);

    let root_cause = raw.root_cause.unwrap_or_default();
    let reasoning = raw.reasoning.unwrap_or_default();
    let recommendations = if raw.recommendations.is_empty() {
        vec!["No actionable recommendations found.".to_string()]
    } else {
        raw.recommendations
    };

    let category = match &raw.category_label {
        Some(label) => Category::from_label(label),
        None => Category::from_keywords(&format!("{root_cause} {reasoning}")),
    };

    Diagnosis {
        root_cause,
        reasoning,
        recommendations,
        patch,
        category,
    }
}

/// A diagnosis is too weak when the backend admitted non-identification or
/// produced only placeholder recommendations.
fn needs_retry(diagnosis: &Diagnosis) -> bool {
    diagnosis.root_cause.to_lowercase().contains("not identified")
        || diagnosis
            .recommendations
            .iter()
            .all(|r| r.to_lowercase().contains("no actionable"))
}

/// Overwrite weak fields from the retry response, or set the explicit
/// could-not-infer sentinels when the retry yielded nothing usable.
fn apply_retry(diagnosis: &mut Diagnosis, retry_text: &str) {
    if let Some(root_cause) = parser::retry_root_cause(retry_text) {
        diagnosis.root_cause = root_cause;
    }
    let recommendations = parser::retry_recommendations(retry_text);
    if !recommendations.is_empty() {
        diagnosis.recommendations = recommendations;
    }

    if diagnosis.root_cause.is_empty() || needs_retry(diagnosis) {
        if diagnosis.root_cause.is_empty()
            || diagnosis.root_cause.to_lowercase().contains("not identified")
        {
            diagnosis.root_cause = "Root cause could not be inferred even after retry.".to_string();
        }
        if diagnosis
            .recommendations
            .iter()
            .all(|r| r.to_lowercase().contains("no actionable"))
        {
            diagnosis.recommendations = vec!["Manual investigation recommended.".to_string()];
        }
    }
}

/// Final validation: fill any still-empty narrative field with sentinel text.
fn finalize(diagnosis: &mut Diagnosis) {
    if diagnosis.root_cause.is_empty() {
        diagnosis.root_cause = "Root cause not identified.".to_string();
    }
    if diagnosis.reasoning.is_empty() {
        diagnosis.reasoning = "No reasoning extracted from RCA output.".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FULL_OUTPUT: &str = "\
Root Cause: Image tag does not exist in the registry
RCA Category: Image
Reasoning: The kubelet cannot pull web:v9 because the tag was never pushed.
Recommendations:
- Push the tag or point the deployment at an existing tag
Patch:
```yaml
spec:
  containers:
  - name: web
    image: registry.local/web:v8
```
";

    #[test]
    fn test_parse_response_full_output() {
        let d = parse_response(FULL_OUTPUT);
        assert_eq!(d.root_cause, "Image tag does not exist in the registry");
        assert_eq!(d.category, Category::ImageIssue);
        assert!(d.reasoning.contains("cannot pull web:v9"));
        assert_eq!(d.recommendations.len(), 1);
        assert!(d.patch.contains("image: registry.local/web:v8"));
        assert!(!d.patch.contains("```"));
    }

    #[test]
    fn test_parse_response_root_cause_only() {
        // Backend returned only `Root Cause: Unknown`: recommendations get
        // the placeholder and the category comes from keyword heuristics.
        let d = parse_response("Root Cause: Unknown");
        assert_eq!(d.root_cause, "Unknown");
        assert_eq!(d.reasoning, "");
        assert_eq!(
            d.recommendations,
            vec!["No actionable recommendations found."]
        );
        assert_eq!(d.patch, patch::PATCH_NONE);
        assert_eq!(d.category, Category::GeneralAnomaly);
    }

    #[test]
    fn test_parse_response_oom_text_categorizes_resource_pressure() {
        let d = parse_response(
            "Root Cause: Container was OOMKilled\nReasoning: memory limit too low for workload",
        );
        assert_eq!(d.category, Category::ResourcePressure);
    }

    #[test]
    fn test_needs_retry_conditions() {
        let mut d = parse_response("Root Cause: Unknown");
        // Placeholder-only recommendations trigger the retry
        assert!(needs_retry(&d));

        d.recommendations = vec!["Scale up".to_string()];
        d.root_cause = "Root cause not identified.".to_string();
        assert!(needs_retry(&d));

        d.root_cause = "Disk full".to_string();
        assert!(!needs_retry(&d));
    }

    #[test]
    fn test_apply_retry_overwrites_weak_fields() {
        let mut d = parse_response("Root Cause: Unknown");
        apply_retry(&mut d, "Root Cause: node disk exhausted\n- free disk space");
        assert_eq!(d.root_cause, "node disk exhausted");
        assert_eq!(d.recommendations, vec!["free disk space"]);
    }

    #[test]
    fn test_apply_retry_empty_sets_sentinels() {
        let mut d = Diagnosis::default();
        apply_retry(&mut d, "");
        assert_eq!(
            d.root_cause,
            "Root cause could not be inferred even after retry."
        );
        assert_eq!(d.recommendations, vec!["Manual investigation recommended."]);
    }

    #[test]
    fn test_finalize_fills_empty_narrative() {
        let mut d = Diagnosis::default();
        finalize(&mut d);
        assert_eq!(d.root_cause, "Root cause not identified.");
        assert_eq!(d.reasoning, "No reasoning extracted from RCA output.");
    }

    #[tokio::test]
    async fn test_diagnose_falls_back_to_secondary_model() {
        let server = MockServer::start().await;

        // Primary model always errors
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        // Fallback model answers with a complete diagnosis
        Mock::given(method("POST"))
            .and(path("/v1beta/models/secondary:generateContent"))
            .and(body_string_contains("Root Cause Analysis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": FULL_OUTPUT}]},
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let client = ReasoningClient::new(GeminiClient::new("key").with_base_url(server.uri()))
            .with_models("primary", "secondary");

        let resource = ResourceRef::new("Pod", "web-1", Some("prod".to_string()));
        let bundle = DiagnosticBundle {
            describe: "ImagePullBackOff".to_string(),
            ..DiagnosticBundle::default()
        };

        let d = client
            .diagnose(&resource, &bundle, "cpu ok", "ImagePullBackOff")
            .await;
        assert_eq!(d.root_cause, "Image tag does not exist in the registry");
        assert_eq!(d.category, Category::ImageIssue);
        assert!(!d.recommendations.is_empty());
    }
}
