//! Kubernetes root-cause-analysis agent.
//!
//! Collects diagnostics for unhealthy cluster resources, runs them through a
//! reasoning backend, and writes structured markdown RCA reports. Runs as a
//! one-shot sweep (`scan`), a continuous monitor (`watch`), or a targeted
//! analysis of a single resource (`analyze`).

mod analyzer;
mod collector;
mod config;
mod cooldown;
mod metrics;
mod reasoning;
mod report;
mod scanner;
mod signals;
mod types;
mod watchers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analyzer::ResourceAnalyzer;
use crate::collector::ClusterCollector;
use crate::config::RcaConfig;
use crate::cooldown::{CooldownStore, SystemClock};
use crate::metrics::MetricsSummarizer;
use crate::reasoning::{GeminiClient, ReasoningClient};
use crate::scanner::{ClusterScanner, ScanOptions};
use crate::types::ResourceRef;
use crate::watchers::{events::EventWatcher, metrics::MetricsWatcher, pods::PodStatusWatcher};

#[derive(Parser)]
#[command(name = "rca-agent", version, about = "Root-cause analysis for Kubernetes clusters")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the cluster once and write a combined report
    Scan {
        /// Include system namespaces in the sweep
        #[arg(long)]
        include_system: bool,

        /// Resource kinds to sweep (comma-separated)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,

        /// Skip resources analyzed within the cooldown window
        #[arg(long)]
        respect_cooldown: bool,

        /// Write the combined report here instead of the report directory
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Watch the cluster continuously and analyze anomalies as they appear
    Watch,

    /// Analyze one resource and print its report
    Analyze {
        /// Resource kind (Pod, Node, Deployment, ...)
        kind: String,

        /// Resource name
        name: String,

        /// Namespace (omit for cluster-scoped kinds)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "rca_agent=debug"
    } else {
        "rca_agent=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = RcaConfig::from_env();
    let api_key = config.require_api_key()?.to_string();

    let collector = ClusterCollector::connect().await;
    let client = collector.client();
    let analyzer = Arc::new(ResourceAnalyzer::new(
        collector,
        MetricsSummarizer::new(config.prom_url.clone()),
        ReasoningClient::new(GeminiClient::new(api_key)),
    ));
    let cooldown = Arc::new(CooldownStore::open(
        &config.cache_file,
        config.cooldown_secs,
        Arc::new(SystemClock),
    ));
    let report_dir = PathBuf::from(&config.report_dir);

    match cli.command {
        Commands::Scan {
            include_system,
            kinds,
            respect_cooldown,
            output,
        } => {
            let mut options = ScanOptions {
                include_system,
                respect_cooldown,
                ..ScanOptions::default()
            };
            if !kinds.is_empty() {
                options.kinds = kinds;
            }

            let scanner = ClusterScanner::new(analyzer, cooldown, config.max_workers);
            let combined = scanner.scan(&options).await;
            if combined.is_empty() {
                info!("Cluster sweep produced no reports");
                return Ok(());
            }

            let path = match output {
                Some(path) => {
                    std::fs::write(&path, &combined).with_context(|| {
                        format!("Failed to write report {}", path.display())
                    })?;
                    path
                }
                None => report::save_cluster(&report_dir, &combined)?,
            };
            info!(path = %path.display(), "Cluster sweep complete");
        }

        Commands::Watch => {
            let (tx, rx) = watchers::trigger_channel();

            let worker = tokio::spawn(watchers::run_trigger_worker(
                rx,
                analyzer,
                cooldown,
                report_dir,
            ));

            tokio::spawn(
                MetricsWatcher::new(
                    tx.clone(),
                    config.metrics_interval_secs,
                    config.cpu_threshold,
                    config.mem_threshold,
                )
                .run(),
            );

            match client {
                Some(client) => {
                    tokio::spawn(EventWatcher::new(client.clone(), tx.clone()).run());
                    tokio::spawn(
                        PodStatusWatcher::new(client, tx.clone(), config.pods_interval_secs).run(),
                    );
                }
                None => {
                    warn!("Kubernetes API unavailable; event and pod-status watchers disabled");
                }
            }
            drop(tx);

            info!("Watch mode running, press Ctrl-C to stop");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
                _ = worker => {}
            }
        }

        Commands::Analyze {
            kind,
            name,
            namespace,
            output,
        } => {
            let resource = ResourceRef::new(kind, name, namespace);
            match analyzer.analyze(&resource).await {
                Some(result) => {
                    println!("{}", result.report);
                    if let Some(path) = output {
                        std::fs::write(&path, &result.report).with_context(|| {
                            format!("Failed to write report {}", path.display())
                        })?;
                        info!(path = %path.display(), "Report written");
                    }
                }
                None => info!(%resource, "No diagnostic context available"),
            }
        }
    }

    Ok(())
}
