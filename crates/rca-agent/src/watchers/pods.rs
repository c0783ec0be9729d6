//! Pod status watcher.
//!
//! The event stream misses conditions that surface only in pod status, such
//! as a container OOMKilled without a fresh event, so this watcher polls pod
//! status across all namespaces on a fixed interval and emits triggers for
//! terminal container states and failing readiness conditions.

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::AnalysisTrigger;
use crate::types::{Category, ResourceRef};

/// Pause after a failed pod list.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Exit code the kernel assigns to OOM-killed processes.
const OOM_EXIT_CODE: i32 = 137;

/// Polls pod status for unhealthy containers.
pub struct PodStatusWatcher {
    client: Client,
    tx: mpsc::Sender<AnalysisTrigger>,
    interval: Duration,
}

impl PodStatusWatcher {
    #[must_use]
    pub fn new(client: Client, tx: mpsc::Sender<AnalysisTrigger>, interval_secs: u64) -> Self {
        Self {
            client,
            tx,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Run until the trigger channel closes.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Pod status watcher started");
        loop {
            let api: Api<Pod> = Api::all(self.client.clone());
            match api.list(&ListParams::default()).await {
                Ok(pods) => {
                    for pod in &pods.items {
                        if let Some(trigger) = pod_trigger(pod) {
                            info!(resource = %trigger.resource, hint = %trigger.hint, "Pod status trigger");
                            if self.tx.send(trigger).await.is_err() {
                                return;
                            }
                        }
                    }
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "Pod list failed, backing off");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Inspect one pod's status for trigger-worthy conditions.
fn pod_trigger(pod: &Pod) -> Option<AnalysisTrigger> {
    let name = pod.metadata.name.as_deref()?;
    let namespace = pod.metadata.namespace.clone();
    let status = pod.status.as_ref()?;

    let resource = ResourceRef::new("Pod", name, namespace);

    for cs in status.container_statuses.iter().flatten() {
        let terminated = cs
            .state
            .as_ref()
            .and_then(|s| s.terminated.as_ref())
            .or_else(|| cs.last_state.as_ref().and_then(|s| s.terminated.as_ref()));
        if let Some(t) = terminated {
            if t.reason.as_deref() == Some("OOMKilled") || t.exit_code == OOM_EXIT_CODE {
                return Some(AnalysisTrigger {
                    resource,
                    hint: Category::ResourcePressure,
                    prefix: "event",
                });
            }
        }

        let waiting = cs.state.as_ref().and_then(|s| s.waiting.as_ref());
        if waiting.and_then(|w| w.reason.as_deref()) == Some("CrashLoopBackOff") {
            return Some(AnalysisTrigger {
                resource,
                hint: Category::ApplicationFailure,
                prefix: "event",
            });
        }
    }

    for condition in status.conditions.iter().flatten() {
        let relevant = condition.type_ == "Ready" || condition.type_ == "ContainersReady";
        let failing = condition.status == "False";
        let reason = condition.reason.as_deref().unwrap_or("");
        if relevant && failing && (reason == "PodFailed" || reason == "CrashLoopBackOff") {
            return Some(AnalysisTrigger {
                resource,
                hint: Category::ApplicationFailure,
                prefix: "event",
            });
        }
    }

    None
}
