//! Utilization summaries for nodes and pods.
//!
//! Prefers a Prometheus instant query when an endpoint is configured, and
//! falls back to a `kubectl top` snapshot. Both paths degrade to a fixed
//! sentinel string rather than failing.

use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Sentinel returned when no node metrics source succeeds.
pub const NO_NODE_METRICS: &str = "No node metrics available";

/// Sentinel returned when no pod metrics source succeeds.
pub const METRICS_UNAVAILABLE: &str = "metrics unavailable";

/// Prometheus query response envelope.
#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    data: PromData,
}

#[derive(Debug, Deserialize)]
struct PromData {
    result: Vec<PromResult>,
}

#[derive(Debug, Deserialize)]
struct PromResult {
    #[serde(default)]
    metric: std::collections::HashMap<String, String>,
    value: Option<(f64, String)>,
}

/// Metrics summarizer with Prometheus-then-snapshot fallback.
pub struct MetricsSummarizer {
    prom_url: Option<String>,
    http: reqwest::Client,
}

impl MetricsSummarizer {
    /// Create a summarizer; `prom_url` enables the time-series path.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(prom_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self { prom_url, http }
    }

    /// Short textual summary of node CPU/memory across the cluster.
    pub async fn summarize_nodes(&self) -> String {
        if let Some(url) = &self.prom_url {
            match self.query_node_cpu(url).await {
                Ok(summary) if !summary.is_empty() => return summary,
                Ok(_) => debug!("Prometheus returned no node series"),
                Err(e) => warn!(error = %e, "Prometheus node query failed, using snapshot"),
            }
        }

        match kubectl_top(&["top", "nodes", "--no-headers"]).await {
            Some(out) => {
                let summary = format_node_top(&out);
                if summary.is_empty() {
                    NO_NODE_METRICS.to_string()
                } else {
                    summary
                }
            }
            None => NO_NODE_METRICS.to_string(),
        }
    }

    /// Point-in-time utilization line for one pod.
    pub async fn summarize_pod(&self, namespace: &str, name: &str) -> String {
        match kubectl_top(&["top", "pod", name, "-n", namespace, "--no-headers"]).await {
            Some(out) if !out.trim().is_empty() => out.trim().to_string(),
            _ => METRICS_UNAVAILABLE.to_string(),
        }
    }

    async fn query_node_cpu(&self, base_url: &str) -> anyhow::Result<String> {
        let url = format!("{}/api/v1/query", base_url.trim_end_matches('/'));
        let query = "sum by (instance) (rate(node_cpu_seconds_total[5m]))";

        let response = self
            .http
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("Prometheus query failed with status {}", response.status());
        }

        let body: PromResponse = response.json().await?;
        if body.status != "success" {
            anyhow::bail!("Prometheus query returned status: {}", body.status);
        }

        let mut lines = Vec::new();
        for result in body.data.result {
            let instance = result
                .metric
                .get("instance")
                .map_or("unknown", String::as_str);
            if let Some((_, value)) = result.value {
                lines.push(format!("{instance}: cpu_rate={value}"));
            }
        }
        Ok(lines.join("\n"))
    }
}

/// Reformat `kubectl top nodes` output into `name: CPU x, Memory y` lines.
fn format_node_top(raw: &str) -> String {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 {
            lines.push(format!("{}: CPU {}, Memory {}", parts[0], parts[1], parts[2]));
        }
    }
    lines.join("\n")
}

async fn kubectl_top(args: &[&str]) -> Option<String> {
    let output = Command::new("kubectl").args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_node_top() {
        let raw = "worker-1   250m   13%   1200Mi   35%\nworker-2   80m    4%    600Mi    17%\n";
        assert_eq!(
            format_node_top(raw),
            "worker-1: CPU 250m, Memory 13%\nworker-2: CPU 80m, Memory 4%"
        );
    }

    #[test]
    fn test_format_node_top_ignores_short_lines() {
        assert_eq!(format_node_top("oops\n\n"), "");
    }

    #[test]
    fn test_prom_response_parses() {
        let json = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"instance": "10.0.0.1:9100"}, "value": [1700000000.0, "0.42"]}
                ]
            }
        }"#;
        let parsed: PromResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.data.result.len(), 1);
        assert_eq!(parsed.data.result[0].value.as_ref().unwrap().1, "0.42");
    }
}
