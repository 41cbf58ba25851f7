use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::trace;

use crate::Endpoint;

/// When the first evaluation may run
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum SettleConfig {
    /// Wait a fixed number of seconds after startup
    FixedDelay {
        #[serde(default = "default_settle_seconds")]
        seconds: u64,
    },

    /// Wait until every endpoint has been probed at least once
    FirstSweep,
}

impl Default for SettleConfig {
    fn default() -> Self {
        SettleConfig::FixedDelay {
            seconds: default_settle_seconds(),
        }
    }
}

fn default_settle_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,

    /// Monitoring tunables (optional - every field has a default)
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TelegramConfig {
    /// Bot token; falls back to the TELEGRAM_TOKEN environment variable
    pub token: Option<String>,
    pub chat_id: String,
}

const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";

impl TelegramConfig {
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TELEGRAM_TOKEN).ok())
            .context("no bot token in config and TELEGRAM_TOKEN is unset")
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Seconds between probe cycles, also the scan interval
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Seconds to wait before retrying after a transport failure
    #[serde(default = "default_error_delay")]
    pub error_delay: u64,

    /// Fraction of a site's hosts that must be down to alert, in [0, 1]
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub settle: SettleConfig,

    /// Where the site → last-change mapping is persisted
    #[serde(default = "default_status_path")]
    pub status_file: PathBuf,

    /// CSV endpoint list, one `address,site` row per monitored host
    #[serde(default = "default_endpoints_path")]
    pub endpoints_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            error_delay: default_error_delay(),
            threshold: default_threshold(),
            settle: SettleConfig::default(),
            status_file: default_status_path(),
            endpoints_file: default_endpoints_path(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_error_delay() -> u64 {
    60
}

fn default_threshold() -> f64 {
    0.5
}

fn default_status_path() -> PathBuf {
    PathBuf::from("./status.json")
}

fn default_endpoints_path() -> PathBuf {
    PathBuf::from("./ip.csv")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config: &Config| trace!("loaded config: {config:?}"))
}

/// Read the endpoint list. Rows with anything other than two non-empty
/// fields are skipped; rows are kept in order and never deduplicated.
pub fn read_endpoints_file(path: &Path) -> anyhow::Result<Vec<Endpoint>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("could not open endpoint list {}", path.display()))?;

    let mut endpoints = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != 2 {
            continue;
        }
        let (address, site) = (&record[0], &record[1]);
        if address.is_empty() || site.is_empty() {
            continue;
        }
        endpoints.push(Endpoint::new(address, site));
    }

    anyhow::ensure!(
        !endpoints.is_empty(),
        "endpoint list {} contains no usable rows",
        path.display()
    );
    Ok(endpoints)
}
