// tests/metrics_ingest.rs
//
// Own test binary: the recorder is process-global.
use fuel_price_monitor::ingest::providers::pzt::ProjectZeroThree;
use fuel_price_monitor::ingest::{run_once, IngestOptions, Normalizer};
use fuel_price_monitor::store::{PriceStore, StoreConfig};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::test]
async fn metrics_exposed_after_ingest() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let store = PriceStore::open(&StoreConfig::new("sqlite::memory:"))
        .await
        .expect("store");
    let raw = std::fs::read_to_string("tests/fixtures/pzt_sample.json").expect("fixture");
    let source = ProjectZeroThree::from_fixture(&raw);
    run_once(&source, &Normalizer::default(), &store, &IngestOptions::default())
        .await
        .expect("ingest");

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    assert!(out.contains("ingest_items_total"));
    assert!(out.contains("ingest_skipped_total"));
    assert!(out.contains("ingest_saved_total"));
    assert!(out.contains("ingest_last_run_ts"));
}
