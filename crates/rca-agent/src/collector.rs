//! Diagnostic collection from the cluster.
//!
//! Every collection operation walks an ordered strategy list: the structured
//! Kubernetes API first, then an equivalent `kubectl` invocation. The first
//! strategy that yields text wins; the terminal fallback is the empty string.
//! Nothing in this module raises past its boundary - an unreachable cluster
//! degrades to empty bundle fields.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod, Service};
use kube::api::{Api, ListParams, LogParams};
use kube::Client;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::{DiagnosticBundle, ResourceRef};

/// Namespaces excluded from cluster sweeps when system exclusion is requested.
pub const SYSTEM_NAMESPACES: &[&str] =
    &["kube-system", "kube-public", "kube-node-lease", "monitoring"];

/// Log tail bound for pod log collection.
const LOG_TAIL_LINES: i64 = 200;

/// Ordered collection strategies. API access is preferred for structured
/// data; the CLI covers clusters where the agent has no client credentials.
#[derive(Debug, Clone, Copy)]
enum Strategy {
    Api,
    Cli,
}

const STRATEGY_ORDER: [Strategy; 2] = [Strategy::Api, Strategy::Cli];

/// Read-only cluster inspector with API-then-CLI fallback.
pub struct ClusterCollector {
    client: Option<Client>,
}

impl ClusterCollector {
    /// Connect to the cluster. A failed connection is not fatal: collection
    /// falls back to `kubectl` for every operation.
    pub async fn connect() -> Self {
        match Client::try_default().await {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(e) => {
                warn!(error = %e, "Kubernetes API unavailable, falling back to kubectl");
                Self { client: None }
            }
        }
    }

    /// Build a collector around an existing client (tests / embedding).
    #[must_use]
    pub fn with_client(client: Option<Client>) -> Self {
        Self { client }
    }

    /// Handle to the underlying API client, when one was established.
    #[must_use]
    pub fn client(&self) -> Option<Client> {
        self.client.clone()
    }

    /// Collect describe/events/logs/metrics text for one resource.
    ///
    /// Logs are collected only for pod-like kinds and tail-bounded. Fields
    /// that cannot be collected by any strategy are empty strings.
    pub async fn collect(&self, resource: &ResourceRef) -> DiagnosticBundle {
        let describe = self.first_success(resource, Section::Describe).await;
        let events = self.first_success(resource, Section::Events).await;
        let logs = if resource.kind.eq_ignore_ascii_case("pod") {
            self.first_success(resource, Section::Logs).await
        } else {
            String::new()
        };
        let metrics = self.top_snapshot(resource).await;

        debug!(
            %resource,
            describe_len = describe.len(),
            events_len = events.len(),
            logs_len = logs.len(),
            "Collected diagnostic bundle"
        );

        DiagnosticBundle {
            describe,
            events,
            logs,
            metrics,
        }
    }

    async fn first_success(&self, resource: &ResourceRef, section: Section) -> String {
        for strategy in STRATEGY_ORDER {
            let out = match (strategy, section) {
                (Strategy::Api, Section::Describe) => self.describe_api(resource).await,
                (Strategy::Api, Section::Events) => self.events_api(resource).await,
                (Strategy::Api, Section::Logs) => self.logs_api(resource).await,
                (Strategy::Cli, Section::Describe) => self.describe_cli(resource).await,
                (Strategy::Cli, Section::Events) => self.events_cli(resource).await,
                (Strategy::Cli, Section::Logs) => self.logs_cli(resource).await,
            };
            if let Some(text) = out {
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
        String::new()
    }

    // ---- structured API strategies ----

    async fn describe_api(&self, resource: &ResourceRef) -> Option<String> {
        let client = self.client.clone()?;
        let ns = resource.namespace.as_deref();
        match resource.kind.to_lowercase().as_str() {
            "pod" => {
                let api: Api<Pod> = Api::namespaced(client, ns?);
                let pod = api.get(&resource.name).await.ok()?;
                serde_json::to_string_pretty(&pod).ok()
            }
            "node" => {
                let api: Api<Node> = Api::all(client);
                let node = api.get(&resource.name).await.ok()?;
                serde_json::to_string_pretty(&node).ok()
            }
            // Deployments/services read better as `kubectl describe` text
            _ => None,
        }
    }

    async fn events_api(&self, resource: &ResourceRef) -> Option<String> {
        let client = self.client.clone()?;
        let api: Api<Event> = match resource.namespace.as_deref() {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        let events = api.list(&ListParams::default()).await.ok()?;

        let mut lines = Vec::new();
        for event in events.items {
            let obj = &event.involved_object;
            let name_matches = obj.name.as_deref() == Some(resource.name.as_str());
            let ns_matches = resource.namespace.is_none()
                || obj.namespace.as_deref() == resource.namespace.as_deref();
            if name_matches && ns_matches {
                lines.push(format_event_line(&event));
            }
        }
        Some(lines.join("\n"))
    }

    async fn logs_api(&self, resource: &ResourceRef) -> Option<String> {
        let client = self.client.clone()?;
        let ns = resource.namespace.as_deref()?;
        let api: Api<Pod> = Api::namespaced(client, ns);
        let params = LogParams {
            tail_lines: Some(LOG_TAIL_LINES),
            ..LogParams::default()
        };
        api.logs(&resource.name, &params).await.ok()
    }

    // ---- CLI strategies ----

    async fn describe_cli(&self, resource: &ResourceRef) -> Option<String> {
        let kind = resource.kind.to_lowercase();
        let mut args = vec!["describe", kind.as_str(), resource.name.as_str()];
        if let Some(ns) = resource.namespace.as_deref() {
            args.extend(["-n", ns]);
        }
        kubectl(&args).await
    }

    async fn events_cli(&self, resource: &ResourceRef) -> Option<String> {
        let selector = format!("involvedObject.name={}", resource.name);
        let mut args = vec!["get", "events", "--field-selector", selector.as_str(), "-o", "wide"];
        if let Some(ns) = resource.namespace.as_deref() {
            args.extend(["-n", ns]);
        }
        kubectl(&args).await
    }

    async fn logs_cli(&self, resource: &ResourceRef) -> Option<String> {
        let tail = format!("--tail={LOG_TAIL_LINES}");
        let mut args = vec!["logs", resource.name.as_str(), tail.as_str()];
        if let Some(ns) = resource.namespace.as_deref() {
            args.extend(["-n", ns]);
        }
        kubectl(&args).await
    }

    /// Point-in-time utilization snapshot for the bundle's metrics field.
    /// `kubectl top` only covers pods and nodes; everything else gets the
    /// unavailable sentinel.
    async fn top_snapshot(&self, resource: &ResourceRef) -> String {
        let out = match resource.kind.to_lowercase().as_str() {
            "pod" => {
                let mut args = vec!["top", "pod", resource.name.as_str(), "--no-headers"];
                if let Some(ns) = resource.namespace.as_deref() {
                    args.extend(["-n", ns]);
                }
                kubectl(&args).await
            }
            "node" => kubectl(&["top", "node", resource.name.as_str(), "--no-headers"]).await,
            _ => None,
        };
        out.filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "metrics unavailable".to_string())
    }

    // ---- enumeration ----

    /// List namespaces, optionally excluding the system deny-list.
    pub async fn list_namespaces(&self, exclude_system: bool) -> Vec<String> {
        let mut namespaces = match self.list_namespaces_api().await {
            Some(names) => names,
            None => self.list_namespaces_cli().await.unwrap_or_default(),
        };
        if exclude_system {
            namespaces = filter_system_namespaces(namespaces);
        }
        namespaces
    }

    async fn list_namespaces_api(&self) -> Option<Vec<String>> {
        let client = self.client.clone()?;
        let api: Api<Namespace> = Api::all(client);
        let list = api.list(&ListParams::default()).await.ok()?;
        Some(
            list.items
                .into_iter()
                .filter_map(|ns| ns.metadata.name)
                .collect(),
        )
    }

    async fn list_namespaces_cli(&self) -> Option<Vec<String>> {
        let out = kubectl(&[
            "get",
            "ns",
            "--no-headers",
            "-o",
            "custom-columns=NAME:.metadata.name",
        ])
        .await?;
        Some(non_empty_lines(&out))
    }

    /// List resource names for a kind in a namespace (or cluster-wide for
    /// cluster-scoped kinds). Unknown kinds fall straight to the CLI.
    pub async fn list_resources(&self, kind: &str, namespace: Option<&str>) -> Vec<String> {
        if let Some(names) = self.list_resources_api(kind, namespace).await {
            return names;
        }
        self.list_resources_cli(kind, namespace)
            .await
            .unwrap_or_default()
    }

    async fn list_resources_api(&self, kind: &str, namespace: Option<&str>) -> Option<Vec<String>> {
        let client = self.client.clone()?;
        let lp = ListParams::default();
        match kind.to_lowercase().as_str() {
            "node" => {
                let api: Api<Node> = Api::all(client);
                let list = api.list(&lp).await.ok()?;
                Some(list.items.into_iter().filter_map(|n| n.metadata.name).collect())
            }
            "pod" => {
                let api: Api<Pod> = Api::namespaced(client, namespace?);
                let list = api.list(&lp).await.ok()?;
                Some(list.items.into_iter().filter_map(|p| p.metadata.name).collect())
            }
            "deployment" => {
                let api: Api<Deployment> = Api::namespaced(client, namespace?);
                let list = api.list(&lp).await.ok()?;
                Some(list.items.into_iter().filter_map(|d| d.metadata.name).collect())
            }
            "service" => {
                let api: Api<Service> = Api::namespaced(client, namespace?);
                let list = api.list(&lp).await.ok()?;
                Some(list.items.into_iter().filter_map(|s| s.metadata.name).collect())
            }
            _ => None,
        }
    }

    async fn list_resources_cli(&self, kind: &str, namespace: Option<&str>) -> Option<Vec<String>> {
        let kind = kind.to_lowercase();
        let mut args = vec![
            "get",
            kind.as_str(),
            "--no-headers",
            "-o",
            "custom-columns=NAME:.metadata.name",
        ];
        match namespace {
            Some(ns) => args.extend(["-n", ns]),
            None => args.push("-A"),
        }
        let out = kubectl(&args).await?;
        Some(non_empty_lines(&out))
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Describe,
    Events,
    Logs,
}

/// Run a kubectl invocation, returning stdout on success and `None` on any
/// failure (missing binary, non-zero exit, undecodable output).
async fn kubectl(args: &[&str]) -> Option<String> {
    let output = Command::new("kubectl").args(args).output().await.ok()?;
    if !output.status.success() {
        debug!(args = ?args, "kubectl invocation failed");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn filter_system_namespaces(namespaces: Vec<String>) -> Vec<String> {
    namespaces
        .into_iter()
        .filter(|ns| !SYSTEM_NAMESPACES.contains(&ns.as_str()))
        .collect()
}

fn format_event_line(event: &Event) -> String {
    let ts = event
        .last_timestamp
        .as_ref()
        .map(|t| t.0.to_rfc3339())
        .or_else(|| event.event_time.as_ref().map(|t| t.0.to_rfc3339()))
        .unwrap_or_default();

    // Skip absent fields so sparse events don't produce runs of spaces
    let mut head = String::new();
    for part in [
        ts.as_str(),
        event.type_.as_deref().unwrap_or(""),
        event.reason.as_deref().unwrap_or(""),
    ] {
        if part.is_empty() {
            continue;
        }
        if !head.is_empty() {
            head.push(' ');
        }
        head.push_str(part);
    }

    format!("{head}: {}", event.message.as_deref().unwrap_or(""))
}
