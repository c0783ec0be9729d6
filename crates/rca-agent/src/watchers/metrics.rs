//! Node metrics watcher.
//!
//! Polls the metrics API (`metrics.k8s.io`) on a fixed interval and emits a
//! trigger for any node whose CPU or memory usage crosses the configured
//! thresholds. The raw quantities arrive in Kubernetes units (nanocores,
//! kibibytes); they are normalized to millicores and mebibytes before the
//! comparison.

use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AnalysisTrigger;
use crate::types::{Category, ResourceRef};

/// Pause after a failed metrics poll.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct NodeMetricsList {
    #[serde(default)]
    items: Vec<NodeMetrics>,
}

#[derive(Debug, Deserialize)]
struct NodeMetrics {
    metadata: NodeMetricsMeta,
    usage: NodeUsage,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsMeta {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeUsage {
    #[serde(default)]
    cpu: String,
    #[serde(default)]
    memory: String,
}

/// Polls node utilization against thresholds.
pub struct MetricsWatcher {
    tx: mpsc::Sender<AnalysisTrigger>,
    interval: Duration,
    cpu_threshold: f64,
    mem_threshold: f64,
}

impl MetricsWatcher {
    /// Thresholds are percent-style knobs on the same scale as the
    /// `RCA_CPU_THRESHOLD`/`RCA_MEM_THRESHOLD` settings.
    #[must_use]
    pub fn new(
        tx: mpsc::Sender<AnalysisTrigger>,
        interval_secs: u64,
        cpu_threshold: f64,
        mem_threshold: f64,
    ) -> Self {
        Self {
            tx,
            interval: Duration::from_secs(interval_secs),
            cpu_threshold,
            mem_threshold,
        }
    }

    /// Run until the trigger channel closes.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            cpu = self.cpu_threshold,
            mem = self.mem_threshold,
            "Metrics watcher started"
        );
        loop {
            match fetch_node_metrics().await {
                Some(list) => {
                    for node in &list.items {
                        if let Some(trigger) = self.check_node(node) {
                            if self.tx.send(trigger).await.is_err() {
                                return;
                            }
                        }
                    }
                    tokio::time::sleep(self.interval).await;
                }
                None => {
                    warn!("Node metrics unavailable, backing off");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    fn check_node(&self, node: &NodeMetrics) -> Option<AnalysisTrigger> {
        let name = node.metadata.name.as_deref()?;
        let cpu_m = parse_cpu_millis(&node.usage.cpu);
        let mem_mi = parse_mem_mi(&node.usage.memory);
        debug!(node = name, cpu_m, mem_mi, "Node usage sampled");

        if cpu_m > self.cpu_threshold * 10.0 || mem_mi > self.mem_threshold * 10.0 {
            info!(node = name, cpu_m, mem_mi, "Node over threshold");
            return Some(AnalysisTrigger {
                resource: ResourceRef::new("Node", name, None),
                hint: Category::ResourcePressure,
                prefix: "metrics",
            });
        }
        None
    }
}

/// Read the node metrics list through the API server's raw endpoint.
async fn fetch_node_metrics() -> Option<NodeMetricsList> {
    let output = Command::new("kubectl")
        .args(["get", "--raw", "/apis/metrics.k8s.io/v1beta1/nodes"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

/// Normalize a Kubernetes CPU quantity to millicores.
fn parse_cpu_millis(quantity: &str) -> f64 {
    let q = quantity.trim();
    if let Some(n) = q.strip_suffix('n') {
        n.parse::<f64>().unwrap_or(0.0) / 1_000_000.0
    } else if let Some(u) = q.strip_suffix('u') {
        u.parse::<f64>().unwrap_or(0.0) / 1_000.0
    } else if let Some(m) = q.strip_suffix('m') {
        m.parse::<f64>().unwrap_or(0.0)
    } else {
        // Bare cores
        q.parse::<f64>().unwrap_or(0.0) * 1_000.0
    }
}

/// Normalize a Kubernetes memory quantity to mebibytes.
fn parse_mem_mi(quantity: &str) -> f64 {
    let q = quantity.trim();
    if let Some(ki) = q.strip_suffix("Ki") {
        ki.parse::<f64>().unwrap_or(0.0) / 1024.0
    } else if let Some(mi) = q.strip_suffix("Mi") {
        mi.parse::<f64>().unwrap_or(0.0)
    } else if let Some(gi) = q.strip_suffix("Gi") {
        gi.parse::<f64>().unwrap_or(0.0) * 1024.0
    } else {
        // Bare bytes
        q.parse::<f64>().unwrap_or(0.0) / (1024.0 * 1024.0)
    }
}
