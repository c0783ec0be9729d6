//! Continuous watch mode.
//!
//! Three independent watchers observe the cluster (event stream, node
//! metrics, pod status) and emit [`AnalysisTrigger`]s onto one bounded
//! channel. A single worker drains the channel, passes each trigger through
//! the shared cooldown gate, and runs the analysis pipeline. Watchers never
//! run analyses themselves, so a slow reasoning backend back-pressures the
//! channel instead of stalling cluster observation.

pub mod events;
pub mod metrics;
pub mod pods;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::analyzer::ResourceAnalyzer;
use crate::cooldown::CooldownStore;
use crate::report;
use crate::types::{Category, ResourceRef};

/// Bound on queued triggers; senders await when the analysis worker falls
/// behind.
pub const TRIGGER_QUEUE_DEPTH: usize = 64;

/// One "analyze this" request from a watcher.
#[derive(Debug, Clone)]
pub struct AnalysisTrigger {
    /// The resource to analyze.
    pub resource: ResourceRef,
    /// The watcher's guess at the failure class, for logging only; the
    /// diagnosis derives its own category.
    pub hint: Category,
    /// Report filename prefix identifying the originating watcher.
    pub prefix: &'static str,
}

/// Create the trigger channel.
#[must_use]
pub fn trigger_channel() -> (
    mpsc::Sender<AnalysisTrigger>,
    mpsc::Receiver<AnalysisTrigger>,
) {
    mpsc::channel(TRIGGER_QUEUE_DEPTH)
}

/// Drain triggers until every sender is dropped: gate on the cooldown
/// store, analyze, and save a per-resource report.
pub async fn run_trigger_worker(
    mut rx: mpsc::Receiver<AnalysisTrigger>,
    analyzer: Arc<ResourceAnalyzer>,
    cooldown: Arc<CooldownStore>,
    report_dir: PathBuf,
) {
    while let Some(trigger) = rx.recv().await {
        let resource = &trigger.resource;

        if cooldown.check_and_mark(resource).await {
            continue;
        }

        info!(%resource, hint = %trigger.hint, source = trigger.prefix, "Trigger accepted");

        match analyzer.analyze(resource).await {
            Some(result) => {
                if let Err(e) = report::save(&report_dir, trigger.prefix, resource, &result.report)
                {
                    error!(%resource, error = %e, "Failed to save report");
                }
            }
            None => warn!(%resource, "Trigger produced no diagnostic context"),
        }
    }
}
