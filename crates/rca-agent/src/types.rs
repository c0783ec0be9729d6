//! Core data model for RCA analysis.
//!
//! Identity, collected diagnostics, and the structured diagnosis that the
//! reasoning backend is parsed into. Every field the pipeline emits has a
//! documented non-empty fallback applied downstream, so consumers never see
//! a half-populated diagnosis.

use serde::{Deserialize, Serialize};

/// Resource kinds that never receive a manifest patch suggestion.
pub const NO_PATCH_KINDS: &[&str] = &["node", "service", "persistentvolume", "pvc"];

/// Identity of a cluster resource under analysis.
///
/// Used as the cooldown/report key. Namespace is `None` for cluster-scoped
/// kinds (for display it normalizes to `default`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource kind (Pod, Node, Deployment, Service, ...)
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Namespace, absent for cluster-scoped resources
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Create a reference from parts.
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace,
        }
    }

    /// Cooldown cache key: `{kind}:{name}:{namespace}`.
    ///
    /// The namespace segment is empty when absent, so cluster-scoped and
    /// namespaced identities never collide.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.kind,
            self.name,
            self.namespace.as_deref().unwrap_or("")
        )
    }

    /// Namespace for display purposes (`default` when absent).
    #[must_use]
    pub fn namespace_display(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }

    /// Whether this kind may carry a manifest patch suggestion.
    #[must_use]
    pub fn patchable(&self) -> bool {
        !NO_PATCH_KINDS.contains(&self.kind.to_lowercase().as_str())
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} (ns={})", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Raw diagnostic text collected for one resource.
///
/// Empty strings mean "unavailable", never an error. The bundle is produced
/// fresh for every analysis and is never cached.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBundle {
    /// Describe/status output for the resource
    pub describe: String,
    /// Related cluster events
    pub events: String,
    /// Pod logs (tail-bounded), empty for non-pod kinds
    pub logs: String,
    /// Point-in-time utilization reading
    pub metrics: String,
}

impl DiagnosticBundle {
    /// True when every field is empty or whitespace - nothing to analyze.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.describe.trim().is_empty()
            && self.events.trim().is_empty()
            && self.logs.trim().is_empty()
            && self.metrics.trim().is_empty()
    }

    /// All fields joined and lower-cased, for signal scanning.
    #[must_use]
    pub fn combined_lowercase(&self) -> String {
        format!(
            "{} {} {} {}",
            self.describe, self.events, self.logs, self.metrics
        )
        .to_lowercase()
    }
}

/// Fixed RCA category label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Infra,
    Config,
    ApplicationFailure,
    NetworkIssue,
    ImageIssue,
    ResourcePressure,
    HealthProbeFailure,
    GeneralAnomaly,
}

impl Category {
    /// Map a free-text category guess from the backend onto the fixed label
    /// set via substring rules. Unrecognized guesses fall through to
    /// `GeneralAnomaly`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let low = label.to_lowercase();
        if low.contains("network") {
            Self::NetworkIssue
        } else if low.contains("image") {
            Self::ImageIssue
        } else if low.contains("resource") {
            Self::ResourcePressure
        } else if low.contains("application") {
            Self::ApplicationFailure
        } else if low.contains("probe") {
            Self::HealthProbeFailure
        } else if low.contains("infra") {
            Self::Infra
        } else if low.contains("config") {
            Self::Config
        } else {
            Self::GeneralAnomaly
        }
    }

    /// Derive a category from diagnosis text when the backend omitted one.
    ///
    /// Fixed precedence: image-pull terms, then probe terms, then memory/OOM
    /// terms, then DNS/connection/timeout terms, else `GeneralAnomaly`.
    #[must_use]
    pub fn from_keywords(text: &str) -> Self {
        let low = text.to_lowercase();
        const IMAGE_TERMS: &[&str] = &[
            "imagepull",
            "imagepullbackoff",
            "errimagepull",
            "image not found",
            "failed to pull",
        ];
        const PROBE_TERMS: &[&str] = &["probe", "readiness", "liveness"];
        const MEMORY_TERMS: &[&str] = &["memory", "oom", "pressure", "oomkilled", "out of memory"];
        const NETWORK_TERMS: &[&str] = &["dns", "connection", "timeout"];

        if IMAGE_TERMS.iter().any(|t| low.contains(t)) {
            Self::ImageIssue
        } else if PROBE_TERMS.iter().any(|t| low.contains(t)) {
            Self::HealthProbeFailure
        } else if MEMORY_TERMS.iter().any(|t| low.contains(t)) {
            Self::ResourcePressure
        } else if NETWORK_TERMS.iter().any(|t| low.contains(t)) {
            Self::NetworkIssue
        } else {
            Self::GeneralAnomaly
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infra => "Infra",
            Self::Config => "Config",
            Self::ApplicationFailure => "Application Failure",
            Self::NetworkIssue => "Network Issue",
            Self::ImageIssue => "Image Issue",
            Self::ResourcePressure => "Resource Pressure",
            Self::HealthProbeFailure => "Health Probe Failure",
            Self::GeneralAnomaly => "General Anomaly",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured diagnosis produced by the reasoning pipeline.
///
/// All fields are populated after the materialization step; the pipeline
/// never returns a diagnosis with an empty root cause, reasoning, or
/// recommendation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Concise one-line root cause
    pub root_cause: String,
    /// Short causal-chain explanation
    pub reasoning: String,
    /// Actionable fixes, never empty
    pub recommendations: Vec<String>,
    /// Suggested manifest patch: empty, a "no change" sentinel, or YAML text.
    /// Never applied automatically.
    pub patch: String,
    /// RCA category
    pub category: Category,
}

impl Default for Diagnosis {
    fn default() -> Self {
        Self {
            root_cause: String::new(),
            reasoning: String::new(),
            recommendations: Vec::new(),
            patch: String::new(),
            category: Category::GeneralAnomaly,
        }
    }
}

/// Completed analysis for one resource.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The resource that was analyzed
    pub resource: ResourceRef,
    /// The materialized diagnosis
    pub diagnosis: Diagnosis,
    /// Rendered markdown report
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_distinguishes_namespace() {
        let namespaced = ResourceRef::new("Pod", "web", Some("prod".to_string()));
        let cluster = ResourceRef::new("Pod", "web", None);
        assert_eq!(namespaced.cache_key(), "Pod:web:prod");
        assert_eq!(cluster.cache_key(), "Pod:web:");
        assert_ne!(namespaced.cache_key(), cluster.cache_key());
    }

    #[test]
    fn test_namespace_display_defaults() {
        let r = ResourceRef::new("Node", "worker-1", None);
        assert_eq!(r.namespace_display(), "default");
    }

    #[test]
    fn test_patchable_kinds() {
        assert!(ResourceRef::new("Pod", "web", None).patchable());
        assert!(ResourceRef::new("Deployment", "web", None).patchable());
        assert!(!ResourceRef::new("Node", "worker-1", None).patchable());
        assert!(!ResourceRef::new("Service", "web", None).patchable());
        assert!(!ResourceRef::new("PersistentVolume", "data", None).patchable());
        assert!(!ResourceRef::new("PVC", "data", None).patchable());
    }

    #[test]
    fn test_bundle_emptiness() {
        let mut bundle = DiagnosticBundle::default();
        assert!(bundle.is_empty());
        bundle.events = "   \n  ".to_string();
        assert!(bundle.is_empty());
        bundle.logs = "OOMKilled".to_string();
        assert!(!bundle.is_empty());
    }

    #[test]
    fn test_category_from_label_substrings() {
        assert_eq!(Category::from_label("Network"), Category::NetworkIssue);
        assert_eq!(
            Category::from_label("some networking trouble"),
            Category::NetworkIssue
        );
        assert_eq!(Category::from_label("Image"), Category::ImageIssue);
        assert_eq!(Category::from_label("Resource"), Category::ResourcePressure);
        assert_eq!(
            Category::from_label("Application"),
            Category::ApplicationFailure
        );
        assert_eq!(Category::from_label("Infra"), Category::Infra);
        assert_eq!(Category::from_label("Config"), Category::Config);
        assert_eq!(Category::from_label("???"), Category::GeneralAnomaly);
    }

    #[test]
    fn test_category_keyword_precedence() {
        // Image terms win over everything else
        assert_eq!(
            Category::from_keywords("failed to pull image, probe failing, oom"),
            Category::ImageIssue
        );
        // Probe before memory
        assert_eq!(
            Category::from_keywords("readiness probe failed under memory load"),
            Category::HealthProbeFailure
        );
        // Memory before network
        assert_eq!(
            Category::from_keywords("container oomkilled after connection spike"),
            Category::ResourcePressure
        );
        assert_eq!(
            Category::from_keywords("upstream connection refused"),
            Category::NetworkIssue
        );
        assert_eq!(Category::from_keywords("nothing obvious"), Category::GeneralAnomaly);
    }
}
