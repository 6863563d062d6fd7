// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod processor;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::normalize::normalize;
pub use crate::ingest::types::{PriceRecord, PriceSource};
pub use crate::processor::{filter_by_fuel, filter_by_state, top_n_cheapest};
pub use crate::store::{PriceQuery, PriceStore, StoreConfig, StoredPrice};

use crate::ingest::providers::pzt::ProjectZeroThree;
use crate::ingest::types::PZT_SOURCE;
use crate::ingest::Normalizer;
use shuttle_axum::axum::Router;
use tracing::info;

/// Open the store (creating the table if needed), wire the Project Zero Three
/// source and return the dashboard router. `/metrics` is added by the binary.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let store = PriceStore::open(&cfg.store).await?;
    let source = ProjectZeroThree::from_url(cfg.pzt_url.clone(), cfg.fetch_timeout)?;
    let normalizer = Normalizer::new(PZT_SOURCE, cfg.aliases.clone());

    info!(
        db = %cfg.store.url,
        url = %cfg.pzt_url,
        timeout_secs = cfg.fetch_timeout.as_secs(),
        snapshots = ?cfg.snapshot_dir,
        "fuel price monitor ready"
    );

    let state = AppState::new(store, Arc::new(source), normalizer, cfg.snapshot_dir.clone());
    Ok(router(state))
}
