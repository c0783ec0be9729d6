//! Heuristic failure-signal extraction.
//!
//! Pure substring matching over the collected diagnostic text. The output is
//! a sorted, deduplicated set drawn from a fixed canonical tag vocabulary,
//! with a `GeneralError` catch-all when only generic failure vocabulary is
//! present.

use crate::types::DiagnosticBundle;

/// Ordered (substring, canonical tag) pattern table.
const PATTERNS: &[(&str, &str)] = &[
    ("crashloopbackoff", "CrashLoopBackOff"),
    ("back-off restarting", "CrashLoopBackOff"),
    ("imagepullbackoff", "ImagePullBackOff"),
    ("failed to pull image", "ImagePullBackOff"),
    ("errimagepull", "ImagePullBackOff"),
    ("oomkilled", "OOMKilled"),
    ("memorypressure", "NodeMemoryPressure"),
    ("diskpressure", "NodeDiskPressure"),
    ("failedscheduling", "FailedScheduling"),
    ("unschedulable", "FailedScheduling"),
    ("evicted", "Evicted"),
    ("node not ready", "NodeNotReady"),
    ("dns", "DNSIssue"),
    ("no such host", "DNSIssue"),
    ("readinessprobe failed", "ProbeFailure"),
    ("livenessprobe failed", "ProbeFailure"),
    ("progressdeadlineexceeded", "FailedRollout"),
    ("unavailable", "UnavailableReplicas"),
    ("connection refused", "ServiceUnavailable"),
    ("timeout", "TimeoutError"),
    ("pod has unbound immediate persistentvolumeclaims", "PVCUnbound"),
];

/// Generic failure vocabulary that triggers the `GeneralError` fallback.
const GENERIC_TOKENS: &[&str] = &["error", "fail", "exception", "critical"];

/// Extract the canonical signal set from a diagnostic bundle.
///
/// Deterministic: the result is sorted and deduplicated. Empty is a valid
/// result (no failure vocabulary at all in the bundle).
#[must_use]
pub fn extract(bundle: &DiagnosticBundle) -> Vec<String> {
    let text = bundle.combined_lowercase();

    let mut signals: Vec<String> = PATTERNS
        .iter()
        .filter(|(needle, _)| text.contains(needle))
        .map(|(_, tag)| (*tag).to_string())
        .collect();
    signals.sort();
    signals.dedup();

    if signals.is_empty() && GENERIC_TOKENS.iter().any(|t| text.contains(t)) {
        signals.push("GeneralError".to_string());
    }

    signals
}

/// Join a signal set for display; the empty set renders as `None`.
#[must_use]
pub fn display(signals: &[String]) -> String {
    if signals.is_empty() {
        "None".to_string()
    } else {
        signals.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(describe: &str, events: &str, logs: &str, metrics: &str) -> DiagnosticBundle {
        DiagnosticBundle {
            describe: describe.to_string(),
            events: events.to_string(),
            logs: logs.to_string(),
            metrics: metrics.to_string(),
        }
    }

    #[test]
    fn test_extract_is_deterministic_and_sorted() {
        let b = bundle(
            "Container OOMKilled during startup",
            "Warning: CrashLoopBackOff",
            "",
            "",
        );
        let first = extract(&b);
        let second = extract(&b);
        assert_eq!(first, second);
        assert_eq!(first, vec!["CrashLoopBackOff", "OOMKilled"]);
    }

    #[test]
    fn test_scenario_backoff_and_oom() {
        // Bundle from the reference scenario: describe mentions a back-off
        // restart, logs mention OOMKilled.
        let b = bundle(
            "Back-off restarting failed container",
            "",
            "OOMKilled",
            "cpu: 10m",
        );
        assert_eq!(extract(&b), vec!["CrashLoopBackOff", "OOMKilled"]);
    }

    #[test]
    fn test_duplicate_patterns_map_to_one_tag() {
        let b = bundle(
            "ImagePullBackOff: failed to pull image nginx:broken",
            "ErrImagePull",
            "",
            "",
        );
        assert_eq!(extract(&b), vec!["ImagePullBackOff"]);
    }

    #[test]
    fn test_general_error_fallback() {
        let b = bundle("something went wrong: error code 5", "", "", "");
        assert_eq!(extract(&b), vec!["GeneralError"]);
    }

    #[test]
    fn test_no_signals_on_clean_text() {
        let b = bundle("Running happily", "Scheduled, Started", "", "cpu 5m");
        assert!(extract(&b).is_empty());
        assert_eq!(display(&extract(&b)), "None");
    }

    #[test]
    fn test_display_joins_sorted() {
        let signals = vec!["CrashLoopBackOff".to_string(), "DNSIssue".to_string()];
        assert_eq!(display(&signals), "CrashLoopBackOff, DNSIssue");
    }

    #[test]
    fn test_probe_and_pvc_patterns() {
        let b = bundle(
            "ReadinessProbe failed: HTTP probe failed",
            "pod has unbound immediate PersistentVolumeClaims",
            "",
            "",
        );
        assert_eq!(extract(&b), vec!["PVCUnbound", "ProbeFailure"]);
    }
}
