//! Markdown report rendering and persistence.
//!
//! One report per analyzed resource, with a fixed section order so reports
//! diff cleanly across runs. Cluster scans concatenate per-resource reports
//! with a visual delimiter into a single file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::types::{Diagnosis, ResourceRef};

/// Separator between per-resource fragments in the combined cluster report.
pub const SCAN_DELIMITER: &str =
    "\n\n-------------------------------------------------------\n\n";

/// Filename of the combined cluster scan report.
pub const CLUSTER_REPORT_FILE: &str = "cluster_rca_report.md";

/// Patch sentinel written for kinds that take no manifest patch.
const NO_CHANGE_SENTINEL: &str = "# No manifest change required.";

/// Render one diagnosis as a markdown report.
#[must_use]
pub fn render(resource: &ResourceRef, diagnosis: &Diagnosis) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# RCA Report for {}: `{}` (Namespace: `{}`)\n\n",
        resource.kind,
        resource.name,
        resource.namespace_display()
    ));
    out.push_str(&format!(
        "### 🧩 Category: {}\n\n",
        diagnosis.category.as_str()
    ));
    out.push_str(&format!("## 🧠 Root Cause\n{}\n\n", diagnosis.root_cause));
    out.push_str(&format!("## 💡 Reasoning\n{}\n\n", diagnosis.reasoning));

    out.push_str("## 🛠 Recommendations\n");
    for rec in &diagnosis.recommendations {
        out.push_str(&format!("- {rec}\n"));
    }

    if has_real_patch(&diagnosis.patch) {
        out.push_str(&format!(
            "\n## 🧩 Suggested Manifest Patch\n```yaml\n{}\n```\n",
            diagnosis.patch.trim_end()
        ));
    }

    out
}

/// A patch section is rendered only when the patch carries actual manifest
/// content, not a no-change sentinel.
fn has_real_patch(patch: &str) -> bool {
    let trimmed = patch.trim();
    !trimmed.is_empty()
        && trimmed != NO_CHANGE_SENTINEL
        && !trimmed.eq_ignore_ascii_case("# none")
        && !trimmed.eq_ignore_ascii_case("none")
}

/// Per-resource report filename: `{prefix}_{kind}_{name}_{namespace}.md`.
///
/// Kinds such as `events.k8s.io/Event` carry slashes; those are replaced so
/// the filename stays a single path component.
#[must_use]
pub fn report_filename(prefix: &str, resource: &ResourceRef) -> String {
    let kind = resource.kind.replace('/', "_");
    format!(
        "{prefix}_{kind}_{}_{}.md",
        resource.name,
        resource.namespace_display()
    )
}

/// Write one per-resource report under `dir`, creating the directory if
/// needed. Returns the path written.
///
/// # Errors
/// Fails if the directory cannot be created or the file cannot be written.
pub fn save(dir: &Path, prefix: &str, resource: &ResourceRef, report: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(report_filename(prefix, resource));
    std::fs::write(&path, report)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Report saved");
    Ok(path)
}

/// Write the combined cluster scan report under `dir`.
///
/// # Errors
/// Fails if the directory cannot be created or the file cannot be written.
pub fn save_cluster(dir: &Path, report: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(CLUSTER_REPORT_FILE);
    std::fs::write(&path, report)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Cluster report saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn sample_diagnosis(patch: &str) -> Diagnosis {
        Diagnosis {
            root_cause: "Memory limit too low".to_string(),
            reasoning: "Container is OOMKilled under load.".to_string(),
            recommendations: vec!["Raise the limit".to_string(), "Add an HPA".to_string()],
            patch: patch.to_string(),
            category: Category::ResourcePressure,
        }
    }

    #[test]
    fn test_render_section_order() {
        let resource = ResourceRef::new("Pod", "web-1", Some("prod".to_string()));
        let report = render(&resource, &sample_diagnosis("spec:\n  replicas: 2"));

        let title = report
            .find("# RCA Report for Pod: `web-1` (Namespace: `prod`)")
            .unwrap();
        let category = report.find("### 🧩 Category: Resource Pressure").unwrap();
        let root = report.find("## 🧠 Root Cause").unwrap();
        let reasoning = report.find("## 💡 Reasoning").unwrap();
        let recs = report.find("## 🛠 Recommendations").unwrap();
        let patch = report.find("## 🧩 Suggested Manifest Patch").unwrap();

        assert!(title < category);
        assert!(category < root);
        assert!(root < reasoning);
        assert!(reasoning < recs);
        assert!(recs < patch);
        assert!(report.contains("- Raise the limit\n- Add an HPA\n"));
        assert!(report.contains("```yaml\nspec:\n  replicas: 2\n```"));
    }

    #[test]
    fn test_render_omits_patch_for_sentinels() {
        let resource = ResourceRef::new("Node", "worker-1", None);
        for sentinel in ["", "# none", "none", NO_CHANGE_SENTINEL] {
            let report = render(&resource, &sample_diagnosis(sentinel));
            assert!(
                !report.contains("Suggested Manifest Patch"),
                "patch section rendered for sentinel {sentinel:?}"
            );
            assert!(!report.contains("```yaml"));
        }
    }

    #[test]
    fn test_render_defaults_namespace() {
        let resource = ResourceRef::new("Node", "worker-1", None);
        let report = render(&resource, &sample_diagnosis(""));
        assert!(report.contains("(Namespace: `default`)"));
    }

    #[test]
    fn test_report_filename_sanitizes_kind() {
        let resource = ResourceRef::new("events.k8s.io/Event", "x", Some("prod".to_string()));
        assert_eq!(
            report_filename("scan", &resource),
            "scan_events.k8s.io_Event_x_prod.md"
        );

        let node = ResourceRef::new("Node", "worker-1", None);
        assert_eq!(report_filename("metrics", &node), "metrics_Node_worker-1_default.md");
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let resource = ResourceRef::new("Pod", "web-1", Some("prod".to_string()));
        let path = save(dir.path(), "event", &resource, "body").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "body");
    }
}
