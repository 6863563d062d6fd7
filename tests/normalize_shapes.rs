// tests/normalize_shapes.rs
use fuel_price_monitor::ingest::{normalize, Normalizer};
use serde_json::{json, Value};

fn items() -> Value {
    json!([
        { "id": 1, "state": "nsw", "fuel": "u91", "price": "1.80", "last_updated": "2024-05-01T08:00:00" },
        { "id": 2, "region": "vic", "FuelType": "diesel", "Price": 1.95 },
    ])
}

#[test]
fn container_and_bare_list_give_identical_records() {
    let bare = normalize(&items());
    let data = normalize(&json!({ "data": items() }));
    let wrapped = normalize(&json!({ "items": items() }));
    let results = normalize(&json!({ "results": items() }));

    assert_eq!(bare.len(), 2);
    assert_eq!(bare, data);
    assert_eq!(bare, wrapped);
    assert_eq!(bare, results);
}

#[test]
fn first_matching_container_key_wins() {
    let payload = json!({
        "prices": [{ "id": "p" }],
        "items": [{ "id": "i" }],
    });
    let out = normalize(&payload);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].ext_station_id.as_deref(), Some("i"));
}

#[test]
fn unrecognized_shape_is_empty_not_error() {
    let report = Normalizer::default().normalize_with_report(&json!({ "foo": "bar" }));
    assert!(report.records.is_empty());
    assert!(!report.recognized);

    assert!(normalize(&json!("just a string")).is_empty());
    assert!(normalize(&Value::Null).is_empty());
}

#[test]
fn defaults_for_missing_price_and_fuel() {
    let out = normalize(&json!([{ "id": "x", "state": "sa" }]));
    assert_eq!(out[0].price, 0.0);
    assert_eq!(out[0].fuel_type, "UNKNOWN");
    assert_eq!(out[0].state.as_deref(), Some("SA"));
    assert_eq!(out[0].source, "projectzerothree");
}

#[test]
fn sample_feed_normalizes_with_one_skip() {
    let raw = std::fs::read_to_string("tests/fixtures/pzt_sample.json").expect("fixture");
    let payload: Value = serde_json::from_str(&raw).expect("json");
    let report = Normalizer::default().normalize_with_report(&payload);

    assert!(report.recognized);
    assert_eq!(report.records.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 4);

    let costco = &report.records[2];
    assert_eq!(costco.ext_station_id.as_deref(), Some("V-88"));
    assert_eq!(costco.state.as_deref(), Some("VIC"));
    assert_eq!(costco.fuel_type, "U91");
    assert_eq!(costco.brand.as_deref(), Some("Costco"));
    assert_eq!(costco.lat, Some(-37.81));

    let logan = &report.records[3];
    assert_eq!(logan.price, 0.0);
    assert_eq!(logan.source_updated, None);
    assert_eq!(logan.fuel_type, "E10");

    // offset-aware and naive timestamps both land in UTC
    let u91 = &report.records[0];
    assert_eq!(
        u91.source_updated.unwrap().to_rfc3339(),
        "2024-04-30T22:30:00+00:00"
    );
    assert_eq!(report.records[1].fuel_type, "DIESEL");
}
