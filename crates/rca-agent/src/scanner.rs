//! Cluster-wide sweep.
//!
//! Enumerates resources of the configured kinds across non-system
//! namespaces, fans analyses out over a bounded worker pool, and aggregates
//! the per-resource reports back in enumeration order so the combined report
//! is stable run to run. One failed analysis never aborts the sweep; it
//! becomes an error fragment in the output.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyzer::ResourceAnalyzer;
use crate::cooldown::CooldownStore;
use crate::report::SCAN_DELIMITER;
use crate::types::{AnalysisResult, ResourceRef};

/// Kinds swept when the caller does not narrow the scan.
pub const DEFAULT_SCAN_KINDS: &[&str] = &["Pod", "Node", "Deployment", "Service"];

/// Per-scan knobs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Sweep system namespaces too (excluded by default).
    pub include_system: bool,
    /// Resource kinds to sweep.
    pub kinds: Vec<String>,
    /// Consult the cooldown store before analyzing each resource. Off by
    /// default: an operator-initiated scan means "look at everything now".
    pub respect_cooldown: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_system: false,
            kinds: DEFAULT_SCAN_KINDS.iter().map(ToString::to_string).collect(),
            respect_cooldown: false,
        }
    }
}

/// Bounded-concurrency cluster sweeper.
pub struct ClusterScanner {
    analyzer: Arc<ResourceAnalyzer>,
    cooldown: Arc<CooldownStore>,
    max_workers: usize,
}

impl ClusterScanner {
    /// Build a scanner over a shared analyzer and cooldown store.
    #[must_use]
    pub fn new(
        analyzer: Arc<ResourceAnalyzer>,
        cooldown: Arc<CooldownStore>,
        max_workers: usize,
    ) -> Self {
        Self {
            analyzer,
            cooldown,
            max_workers: max_workers.max(1),
        }
    }

    /// Sweep the cluster and return the combined markdown report. Empty when
    /// nothing was enumerated or every analysis came back empty.
    pub async fn scan(&self, options: &ScanOptions) -> String {
        let node_summary = self.analyzer.metrics().summarize_nodes().await;
        info!(summary = %node_summary, "Cluster node metrics summary");

        let targets = self.enumerate(options).await;
        info!(targets = targets.len(), "Cluster sweep enumerated");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut handles = Vec::new();

        for resource in targets {
            if options.respect_cooldown && self.cooldown.check_and_mark(&resource).await {
                continue;
            }

            let analyzer = Arc::clone(&self.analyzer);
            let semaphore = Arc::clone(&semaphore);
            let target = resource.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                analyzer.analyze(&target).await
            });
            handles.push((resource, handle));
        }

        let fragments = collect_fragments(handles).await;
        combine(&fragments)
    }

    async fn enumerate(&self, options: &ScanOptions) -> Vec<ResourceRef> {
        let collector = self.analyzer.collector();
        let namespaces = collector.list_namespaces(!options.include_system).await;
        let mut targets = Vec::new();

        for kind in &options.kinds {
            if kind.eq_ignore_ascii_case("node") {
                for name in collector.list_resources(kind, None).await {
                    targets.push(ResourceRef::new(kind.clone(), name, None));
                }
                continue;
            }
            for ns in &namespaces {
                for name in collector.list_resources(kind, Some(ns)).await {
                    targets.push(ResourceRef::new(kind.clone(), name, Some(ns.clone())));
                }
            }
        }

        targets
    }
}

/// Await analysis tasks in enumeration order so the combined report is
/// deterministic regardless of completion order. A panicked task becomes an
/// inline error fragment; its siblings are unaffected.
async fn collect_fragments(
    handles: Vec<(ResourceRef, JoinHandle<Option<AnalysisResult>>)>,
) -> Vec<String> {
    let mut fragments = Vec::new();
    for (resource, handle) in handles {
        match handle.await {
            Ok(Some(result)) => fragments.push(result.report),
            Ok(None) => {}
            Err(e) => {
                warn!(%resource, error = %e, "Analysis task failed");
                fragments.push(format!("# ⚠️ Analyzer error: {e}"));
            }
        }
    }
    fragments
}

/// Join report fragments with the scan delimiter.
fn combine(fragments: &[String]) -> String {
    fragments.join(SCAN_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Diagnosis;

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.kinds, vec!["Pod", "Node", "Deployment", "Service"]);
        assert!(!options.include_system);
        assert!(!options.respect_cooldown);
    }

    #[test]
    fn test_combine_uses_delimiter() {
        let fragments = vec!["# one".to_string(), "# two".to_string()];
        let combined = combine(&fragments);
        assert_eq!(
            combined,
            "# one\n\n-------------------------------------------------------\n\n# two"
        );
    }

    #[test]
    fn test_combine_empty_is_empty() {
        assert_eq!(combine(&[]), "");
        assert_eq!(combine(&["# only".to_string()]), "# only");
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_error_fragment() {
        let mut handles = Vec::new();
        for i in 0..6 {
            let resource = ResourceRef::new("Pod", format!("web-{i}"), Some("prod".to_string()));
            let handle: JoinHandle<Option<AnalysisResult>> = if i == 3 {
                tokio::spawn(async { panic!("analysis blew up") })
            } else {
                let target = resource.clone();
                tokio::spawn(async move {
                    Some(AnalysisResult {
                        resource: target.clone(),
                        diagnosis: Diagnosis::default(),
                        report: format!("# RCA Report for Pod: `{}`", target.name),
                    })
                })
            };
            handles.push((resource, handle));
        }

        let fragments = collect_fragments(handles).await;

        // All six slots survive in enumeration order; the panicked one is
        // rendered inline, the siblings are untouched.
        assert_eq!(fragments.len(), 6);
        assert!(fragments[3].starts_with("# ⚠️ Analyzer error:"));
        for i in [0, 1, 2, 4, 5] {
            assert_eq!(fragments[i], format!("# RCA Report for Pod: `web-{i}`"));
        }
    }
}
