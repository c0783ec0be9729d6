//! Cluster event watcher.
//!
//! Watches the cluster-wide event stream and emits a trigger whenever an
//! event's reason matches the RCA trigger list. The stream is restarted with
//! a short backoff when it ends or fails.

use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Event;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::AnalysisTrigger;
use crate::types::{Category, ResourceRef};

/// Event reasons that warrant a root-cause analysis.
pub const RCA_TRIGGERS: &[&str] = &[
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "ErrImagePull",
    "OOMKilled",
    "FailedScheduling",
    "BackOff",
    "ProbeError",
    "Unhealthy",
];

/// Pause before restarting a failed or completed watch stream.
const RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// Watches cluster events for trigger-worthy reasons.
pub struct EventWatcher {
    client: Client,
    tx: mpsc::Sender<AnalysisTrigger>,
}

impl EventWatcher {
    #[must_use]
    pub fn new(client: Client, tx: mpsc::Sender<AnalysisTrigger>) -> Self {
        Self { client, tx }
    }

    /// Run until the trigger channel closes.
    pub async fn run(self) {
        info!("Event watcher started");
        loop {
            let api: Api<Event> = Api::all(self.client.clone());
            let mut stream = watcher(api, watcher::Config::default())
                .applied_objects()
                .boxed();

            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        if let Some(trigger) = trigger_for(&event) {
                            info!(resource = %trigger.resource, reason = ?event.reason, "Event trigger");
                            if self.tx.send(trigger).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Event watch error");
                        break;
                    }
                }
            }

            warn!("Event stream ended, restarting");
            tokio::time::sleep(RESTART_BACKOFF).await;
        }
    }
}

/// Map one cluster event onto a trigger, when its reason contains one of
/// the trigger tokens and the involved object is identifiable. Containment
/// rather than equality, so composite reasons embedding a token still fire.
fn trigger_for(event: &Event) -> Option<AnalysisTrigger> {
    let reason = event.reason.as_deref()?;
    if !RCA_TRIGGERS.iter().any(|t| reason.contains(t)) {
        return None;
    }

    let obj = &event.involved_object;
    let kind = obj.kind.as_deref()?;
    let name = obj.name.as_deref()?;

    Some(AnalysisTrigger {
        resource: ResourceRef::new(kind, name, obj.namespace.clone()),
        hint: Category::from_keywords(reason),
        prefix: "event",
    })
}
