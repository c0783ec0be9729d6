//! Prompt templates for the reasoning backend.
//!
//! The main prompt instructs the backend to answer in five fixed labeled
//! sections so the section parser has a stable grammar to work against; the
//! retry prompt is shorter and more directive, used once when the first
//! diagnosis is judged too weak.

use crate::types::{DiagnosticBundle, ResourceRef};

/// Build the structured RCA prompt for one resource.
#[must_use]
pub fn build_prompt(
    resource: &ResourceRef,
    bundle: &DiagnosticBundle,
    metrics_summary: &str,
    signals: &str,
) -> String {
    format!(
        r"You are an expert Site Reliability Engineer performing Root Cause Analysis on Kubernetes infrastructure.

### Context
Resource Kind: {kind}
Name: {name}
Namespace: {namespace}
Detected Signals: {signals}

### Cluster Describe
{describe}

### Events
{events}

### Logs
{logs}

### Metrics
{metrics}

---

### Instruction
Analyze the above data and identify:
1. Root cause - concise one-line diagnosis.
2. RCA Category: <Infra | Config | Application | Network | Image | Resource>
3. Reasoning - 2-5 sentence summary explaining the causal chain.
4. Recommendations - bullet points of actionable fixes.
5. YAML patch - minimal manifest changes to remediate (if relevant).
If no manifest change is required (e.g., node or service issue), respond with:
`Patch: # none`

Respond **exactly** in this format:

Root Cause: <one-line>
RCA Category: <Infra | Config | Application | Network | Image | Resource>
Reasoning: <multi-line short paragraph>
Recommendations:
- <item1>
- <item2>
Patch:
```yaml
<YAML fix or leave '# none'>
```
",
        kind = resource.kind,
        name = resource.name,
        namespace = resource.namespace.as_deref().unwrap_or(""),
        signals = signals,
        describe = bundle.describe,
        events = bundle.events,
        logs = bundle.logs,
        metrics = metrics_summary,
    )
}

/// Shorter, more directive prompt for the single bounded retry.
#[must_use]
pub fn build_retry_prompt(
    resource: &ResourceRef,
    bundle: &DiagnosticBundle,
    metrics_summary: &str,
    signals: &str,
) -> String {
    format!(
        "Focus only on finding a concrete root cause and actionable fix.\n\
         If metrics or events imply a cause, infer it.\n\
         Object: {}/{} (ns={})\n\
         Describe:\n{}\n\nEvents:\n{}\n\nLogs:\n{}\n\nMetrics:\n{}\n\nSignals:\n{}\n",
        resource.kind,
        resource.name,
        resource.namespace.as_deref().unwrap_or(""),
        bundle.describe,
        bundle.events,
        bundle.logs,
        metrics_summary,
        signals,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_identity_and_signals() {
        let resource = ResourceRef::new("Pod", "web-1", Some("prod".to_string()));
        let bundle = DiagnosticBundle {
            describe: "describe-text".to_string(),
            events: "event-text".to_string(),
            logs: "log-text".to_string(),
            metrics: String::new(),
        };
        let prompt = build_prompt(&resource, &bundle, "cpu ok", "CrashLoopBackOff");

        assert!(prompt.contains("Resource Kind: Pod"));
        assert!(prompt.contains("Name: web-1"));
        assert!(prompt.contains("Namespace: prod"));
        assert!(prompt.contains("Detected Signals: CrashLoopBackOff"));
        assert!(prompt.contains("describe-text"));
        assert!(prompt.contains("cpu ok"));
        // The five labeled sections the parser expects
        assert!(prompt.contains("Root Cause:"));
        assert!(prompt.contains("RCA Category:"));
        assert!(prompt.contains("Reasoning:"));
        assert!(prompt.contains("Recommendations:"));
        assert!(prompt.contains("Patch:"));
    }
}
