//! Fuel Price Monitor: binary entrypoint
//! Boots the Axum HTTP server: config from env, SQLite store, dashboard routes, /metrics.

use fuel_price_monitor::{telemetry::Metrics, AppConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact fmt logs filtered by RUST_LOG. The runtime may already have a
/// subscriber installed, in which case this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fuel_price_monitor=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::from_env()?;
    let metrics = Metrics::init()?;
    let router = fuel_price_monitor::build_app(&cfg).await?;

    Ok(router.merge(metrics.router()).into())
}
