// src/config/app.rs
use anyhow::{Context, Result};
use std::{env, path::PathBuf, time::Duration};

use crate::ingest::config::{load_aliases_default, FieldAliases};
use crate::ingest::providers::pzt::{DEFAULT_FETCH_TIMEOUT, PZT_URL};
use crate::store::{StoreConfig, DEFAULT_DATABASE_URL};

// --- env names ---
pub const ENV_DB_URL: &str = "FUEL_DB_URL";
pub const ENV_PZT_URL: &str = "PZT_URL";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
pub const ENV_SNAPSHOT_DIR: &str = "SNAPSHOT_DIR";

pub const DEFAULT_SNAPSHOT_DIR: &str = "./snapshots";

/// Everything the binary needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub pzt_url: String,
    pub fetch_timeout: Duration,
    /// `None` disables snapshots (SNAPSHOT_DIR set to an empty string).
    pub snapshot_dir: Option<PathBuf>,
    pub aliases: FieldAliases,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::new(DEFAULT_DATABASE_URL),
            pzt_url: PZT_URL.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            snapshot_dir: Some(PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            aliases: FieldAliases::default(),
        }
    }
}

impl AppConfig {
    /// Read the environment (call `dotenvy::dotenv()` first to pick up `.env`).
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(url) = non_empty_var(ENV_DB_URL) {
            cfg.store = StoreConfig::new(url);
        }
        if let Some(url) = non_empty_var(ENV_PZT_URL) {
            cfg.pzt_url = url;
        }
        if let Some(raw) = non_empty_var(ENV_FETCH_TIMEOUT_SECS) {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_SECS} must be whole seconds, got {raw:?}"))?;
            cfg.fetch_timeout = Duration::from_secs(secs.max(1));
        }
        if let Ok(dir) = env::var(ENV_SNAPSHOT_DIR) {
            let dir = dir.trim();
            cfg.snapshot_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }
        cfg.aliases = load_aliases_default().context("loading field aliases")?;

        Ok(cfg)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
