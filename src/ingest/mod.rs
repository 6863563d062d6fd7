// src/ingest/mod.rs
pub mod config;
pub mod normalize;
pub mod providers;
pub mod snapshot;
pub mod types;

pub use normalize::{normalize, FieldError, NormalizeReport, Normalizer};

use crate::ingest::types::PriceSource;
use crate::processor::{filter_by_fuel, filter_by_state};
use crate::store::PriceStore;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items normalized into price records.");
        describe_counter!(
            "ingest_skipped_total",
            "Items dropped because a field could not be coerced."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Records dropped by the state/fuel pre-filter."
        );
        describe_counter!("ingest_saved_total", "Records upserted into the store.");
        describe_counter!("fetch_errors_total", "Price source fetch/parse errors.");
        describe_histogram!("fetch_duration_ms", "Price source fetch time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when the ingest pipeline last ran.");
    });
}

/// Fetch from `source`, turning any failure into "no data".
/// The transport error is logged here and goes no further.
pub async fn fetch_payload(source: &dyn PriceSource) -> Option<Value> {
    match source.fetch_raw().await {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, source = source.name(), "fetch failed");
            counter!("fetch_errors_total").increment(1);
            None
        }
    }
}

/// Optional pre-persistence scoping. `None` (or "ANY") keeps everything.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub state: Option<String>,
    pub fuel: Option<String>,
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct IngestReport {
    pub fetched: bool,
    pub recognized: bool,
    pub normalized: usize,
    pub skipped: usize,
    pub filtered: usize,
    pub saved: usize,
    pub snapshot: Option<PathBuf>,
}

/// Treats blank values and the dashboard's "ANY" as "no filter".
pub fn selector(v: Option<&str>) -> Option<&str> {
    v.map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("any"))
}

/// Normalize an already-fetched payload, apply filters and upsert.
/// Returns the report with `fetched = true`; `snapshot` is left to the caller.
pub async fn save_payload(
    payload: &Value,
    normalizer: &Normalizer,
    store: &PriceStore,
    state: Option<&str>,
    fuel: Option<&str>,
) -> Result<IngestReport> {
    ensure_metrics_described();

    let report = normalizer.normalize_with_report(payload);
    let normalized = report.records.len();
    let mut records = report.records;
    if let Some(s) = selector(state) {
        records = filter_by_state(records, s);
    }
    if let Some(f) = selector(fuel) {
        records = filter_by_fuel(records, f);
    }
    let filtered = normalized - records.len();

    let saved = store.upsert(&records).await?;

    counter!("ingest_items_total").increment(normalized as u64);
    counter!("ingest_skipped_total").increment(report.skipped.len() as u64);
    counter!("ingest_filtered_total").increment(filtered as u64);
    counter!("ingest_saved_total").increment(saved as u64);

    Ok(IngestReport {
        fetched: true,
        recognized: report.recognized,
        normalized,
        skipped: report.skipped.len(),
        filtered,
        saved,
        snapshot: None,
    })
}

/// Run the whole pipeline once: fetch → snapshot → normalize → filter → upsert.
///
/// A failed fetch is not an error (`fetched = false`); a failed snapshot is
/// logged and skipped. Store failures abort the run.
pub async fn run_once(
    source: &dyn PriceSource,
    normalizer: &Normalizer,
    store: &PriceStore,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    ensure_metrics_described();

    let Some(payload) = fetch_payload(source).await else {
        return Ok(IngestReport::default());
    };

    let snapshot = opts
        .snapshot_dir
        .as_deref()
        .and_then(|dir| try_snapshot(&payload, dir));

    let mut report = save_payload(
        &payload,
        normalizer,
        store,
        opts.state.as_deref(),
        opts.fuel.as_deref(),
    )
    .await?;
    report.snapshot = snapshot;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("ingest_last_run_ts").set(now as f64);

    tracing::info!(
        target: "ingest",
        source = source.name(),
        recognized = report.recognized,
        normalized = report.normalized,
        skipped = report.skipped,
        filtered = report.filtered,
        saved = report.saved,
        "ingest run finished"
    );
    Ok(report)
}

pub(crate) fn try_snapshot(payload: &Value, dir: &Path) -> Option<PathBuf> {
    match snapshot::save_snapshot(payload, dir) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, "snapshot failed");
            None
        }
    }
}
