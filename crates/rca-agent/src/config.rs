//! Process configuration loaded from the environment.

use anyhow::{Context, Result};

/// Runtime configuration for the RCA agent.
///
/// Everything has a documented default except the reasoning-backend
/// credential, which is a fatal precondition for any command that reaches
/// the backend.
#[derive(Debug, Clone)]
pub struct RcaConfig {
    /// Reasoning-backend API key (`GEMINI_API_KEY`). Required at startup for
    /// scan/watch/analyze; its absence is the only fatal configuration error.
    pub gemini_api_key: Option<String>,
    /// Optional Prometheus endpoint (`PROM_URL`) for time-series metrics.
    pub prom_url: Option<String>,
    /// Scanner worker-pool width (`RCA_MAX_WORKERS`).
    pub max_workers: usize,
    /// Cooldown window in seconds (`RCA_COOLDOWN_SECS`).
    pub cooldown_secs: u64,
    /// Metrics watcher poll interval in seconds (`RCA_METRICS_INTERVAL`).
    pub metrics_interval_secs: u64,
    /// Pod-status watcher poll interval in seconds (`RCA_PODS_INTERVAL`).
    pub pods_interval_secs: u64,
    /// Node CPU alert threshold (`RCA_CPU_THRESHOLD`).
    pub cpu_threshold: f64,
    /// Node memory alert threshold (`RCA_MEM_THRESHOLD`).
    pub mem_threshold: f64,
    /// Directory for per-trigger reports (`RCA_REPORT_DIR`).
    pub report_dir: String,
    /// Cooldown cache file (`RCA_CACHE_FILE`).
    pub cache_file: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RcaConfig {
    /// Load configuration from environment variables, applying defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            prom_url: std::env::var("PROM_URL").ok().filter(|u| !u.is_empty()),
            max_workers: env_parse("RCA_MAX_WORKERS", 6),
            cooldown_secs: env_parse("RCA_COOLDOWN_SECS", 300),
            metrics_interval_secs: env_parse("RCA_METRICS_INTERVAL", 30),
            pods_interval_secs: env_parse("RCA_PODS_INTERVAL", 20),
            cpu_threshold: env_parse("RCA_CPU_THRESHOLD", 80.0),
            mem_threshold: env_parse("RCA_MEM_THRESHOLD", 80.0),
            report_dir: std::env::var("RCA_REPORT_DIR")
                .unwrap_or_else(|_| "rca_reports".to_string()),
            cache_file: std::env::var("RCA_CACHE_FILE")
                .unwrap_or_else(|_| "rca_seen_cache.json".to_string()),
        }
    }

    /// The reasoning credential, or a fatal startup error.
    pub fn require_api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .context("GEMINI_API_KEY is not set - the reasoning backend credential is required")
    }
}
