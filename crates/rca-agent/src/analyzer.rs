//! Per-resource analysis pipeline.
//!
//! Collect diagnostics, summarize metrics, extract signals, ask the
//! reasoning backend, then materialize the diagnosis: one place where every
//! weak or missing field receives its documented fallback. After
//! materialization no consumer ever sees an empty root cause, reasoning,
//! or recommendation list.

use tracing::{debug, info};

use crate::collector::ClusterCollector;
use crate::metrics::MetricsSummarizer;
use crate::reasoning::ReasoningClient;
use crate::report;
use crate::signals;
use crate::types::{AnalysisResult, Diagnosis, ResourceRef};

/// Kinds whose metrics summary targets the workload itself rather than the
/// node fleet.
const WORKLOAD_KINDS: &[&str] = &["pod", "deployment", "replicaset", "statefulset"];

/// End-to-end analyzer for a single resource.
pub struct ResourceAnalyzer {
    collector: ClusterCollector,
    metrics: MetricsSummarizer,
    reasoning: ReasoningClient,
}

impl ResourceAnalyzer {
    /// Assemble the pipeline from its stages.
    #[must_use]
    pub fn new(
        collector: ClusterCollector,
        metrics: MetricsSummarizer,
        reasoning: ReasoningClient,
    ) -> Self {
        Self {
            collector,
            metrics,
            reasoning,
        }
    }

    /// Borrow the collector (for enumeration during scans).
    #[must_use]
    pub fn collector(&self) -> &ClusterCollector {
        &self.collector
    }

    /// Borrow the metrics summarizer (for the scan-wide metrics header).
    #[must_use]
    pub fn metrics(&self) -> &MetricsSummarizer {
        &self.metrics
    }

    /// Analyze one resource. Returns `None` when no diagnostic context could
    /// be collected - a vanished or unreachable resource is not an error.
    pub async fn analyze(&self, resource: &ResourceRef) -> Option<AnalysisResult> {
        info!(%resource, "Starting analysis");

        let bundle = self.collector.collect(resource).await;
        if bundle.is_empty() {
            info!(%resource, "No diagnostic context available, skipping");
            return None;
        }

        let metrics_summary = self.metrics_for(resource).await;
        let detected = signals::extract(&bundle);
        let signals_display = signals::display(&detected);
        debug!(%resource, signals = %signals_display, "Signals extracted");

        let mut diagnosis = self
            .reasoning
            .diagnose(resource, &bundle, &metrics_summary, &signals_display)
            .await;
        materialize(resource, &signals_display, &mut diagnosis);

        let rendered = report::render(resource, &diagnosis);
        Some(AnalysisResult {
            resource: resource.clone(),
            diagnosis,
            report: rendered,
        })
    }

    async fn metrics_for(&self, resource: &ResourceRef) -> String {
        let kind = resource.kind.to_lowercase();
        if WORKLOAD_KINDS.contains(&kind.as_str()) {
            if let Some(ns) = resource.namespace.as_deref() {
                return self.metrics.summarize_pod(ns, &resource.name).await;
            }
        }
        self.metrics.summarize_nodes().await
    }
}

/// Apply the documented fallbacks so every diagnosis field is usable.
///
/// Root cause shorter than 5 characters, reasoning shorter than 20, an empty
/// recommendation list, and degenerate patches all get replaced with
/// contextual text. The patch replacement is kind-aware: kinds that never
/// take a manifest patch get an empty patch so no patch section is rendered.
pub fn materialize(resource: &ResourceRef, signals_display: &str, diagnosis: &mut Diagnosis) {
    if diagnosis.root_cause.trim().len() < 5 {
        diagnosis.root_cause = "Root cause not identifiable".to_string();
    }

    if diagnosis.reasoning.trim().len() < 20 {
        diagnosis.reasoning = format!(
            "No sufficient diagnostic context for {} `{}` in namespace `{}`. \
             Detected signals: {}. Possible transient or resolved condition.",
            resource.kind,
            resource.name,
            resource.namespace_display(),
            signals_display
        );
    }

    if diagnosis.recommendations.is_empty() {
        diagnosis.recommendations = vec![format!(
            "No specific remediation identified for {} `{}`.",
            resource.kind, resource.name
        )];
    }

    // Kinds that never take a manifest patch get an empty one, whatever the
    // backend produced.
    if !resource.patchable() {
        diagnosis.patch = String::new();
        return;
    }

    let patch = diagnosis.patch.trim();
    let degenerate = patch.is_empty()
        || patch.eq_ignore_ascii_case("# none")
        || patch.eq_ignore_ascii_case("none")
        || patch.len() < 5;
    if degenerate {
        diagnosis.patch = "# No manifest change required.".to_string();
    }
}
