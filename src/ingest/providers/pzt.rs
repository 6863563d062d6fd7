// src/ingest/providers/pzt.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::ingest::types::{PriceSource, PZT_SOURCE};

pub const PZT_URL: &str = "https://projectzerothree.info/api.php?format=json";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Project Zero Three price feed. The payload may be a bare list or an object
/// wrapping one; shape handling is left to the normalizer.
pub struct ProjectZeroThree {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl ProjectZeroThree {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// Single GET per fetch, bounded by `timeout` (connect + read). No retries.
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building pzt http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }
}

#[async_trait]
impl PriceSource for ProjectZeroThree {
    async fn fetch_raw(&self) -> Result<Value> {
        match &self.mode {
            Mode::Fixture(s) => serde_json::from_str(s).context("parsing pzt fixture json"),
            Mode::Http { url, client } => {
                let t0 = Instant::now();
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .context("pzt http get()")?
                    .error_for_status()
                    .context("pzt http status")?;
                let body: Value = resp.json().await.context("pzt http .json()")?;

                let ms = t0.elapsed().as_secs_f64() * 1_000.0;
                histogram!("fetch_duration_ms").record(ms);
                tracing::debug!(target: "ingest", %url, ms, "pzt payload fetched");
                Ok(body)
            }
        }
    }

    fn name(&self) -> &'static str {
        PZT_SOURCE
    }
}
