//! Configuration for the failover agent.

use anyhow::{bail, Context, Result};
use fasi_reconcile::pairs::{DEFAULT_ADDRESS_TAG, DEFAULT_FAILOVER_TAG, DEFAULT_VOLUME_TAG};
use fasi_reconcile::{ReconcileSettings, TagKeys, DEFAULT_MAX_PAGES, DEFAULT_VOLUME_DEVICE};

/// Failover agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the provider gateway.
    pub provider_url: String,

    /// Region sent with every provider call.
    pub region: String,

    /// Tag keys recognized on primary groups.
    pub tags: TagKeys,

    /// Device name for volume attachment.
    pub volume_device: String,

    /// Upper bound on catalog pages per run.
    pub max_pages: usize,

    /// Seconds between reconciliation runs.
    pub interval_secs: u64,

    /// Run a single pass and exit.
    pub run_once: bool,

    /// Log commands instead of sending them.
    pub dry_run: bool,

    /// Timeout for each provider request, in seconds.
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let provider_url = text("FASI_PROVIDER_URL", "http://127.0.0.1:4566")
            .trim_end_matches('/')
            .to_string();
        let region = text("FASI_REGION", "sa-east-1");

        let key = |var: &str, default: &str| required(text(var, default), var);
        let tags = TagKeys {
            failover: key("FASI_TAG_FAILOVER", DEFAULT_FAILOVER_TAG)?,
            address: key("FASI_TAG_ELASTIC_IP", DEFAULT_ADDRESS_TAG)?,
            volume: key("FASI_TAG_EBS", DEFAULT_VOLUME_TAG)?,
        };
        let volume_device = key("FASI_VOLUME_DEVICE", DEFAULT_VOLUME_DEVICE)?;

        let max_pages: usize = number(&lookup, "FASI_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        if max_pages == 0 {
            bail!("FASI_MAX_PAGES must be at least 1");
        }
        let interval_secs = number(&lookup, "FASI_INTERVAL_SECS", 60)?;
        let request_timeout_secs = number(&lookup, "FASI_REQUEST_TIMEOUT_SECS", 30)?;

        let run_once = flag(&lookup, "FASI_RUN_ONCE");
        let dry_run = flag(&lookup, "FASI_DRY_RUN");
        let log_level = text("FASI_LOG_LEVEL", "info");

        Ok(Self {
            provider_url,
            region,
            tags,
            volume_device,
            max_pages,
            interval_secs,
            run_once,
            dry_run,
            request_timeout_secs,
            log_level,
        })
    }

    /// Settings handed to the reconciler.
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            tags: self.tags.clone(),
            volume_device: self.volume_device.clone(),
            max_pages: self.max_pages,
            dry_run: self.dry_run,
        }
    }
}

fn required(value: String, key: &str) -> Result<String> {
    if value.trim().is_empty() {
        bail!("{key} must not be empty");
    }
    Ok(value)
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}
