// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Origin identifier written into every record parsed from Project Zero Three.
pub const PZT_SOURCE: &str = "projectzerothree";

pub const UNKNOWN_FUEL: &str = "UNKNOWN";
pub const DEFAULT_CURRENCY: &str = "AUD";

/// One normalized fuel price observation, ready to be upserted.
///
/// `(source, ext_station_id, fuel_type, source_updated)` is the natural key.
/// `fetched_at` is not part of this type; the store stamps it at write time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct PriceRecord {
    pub source: String,                 // e.g. "projectzerothree"
    pub ext_station_id: Option<String>, // origin's own station id
    pub state: Option<String>,          // uppercased region code
    pub brand: Option<String>,
    pub station_name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub fuel_type: String, // uppercased, "UNKNOWN" when missing
    pub price: f64,        // 0.0 when missing (unknown and free look the same)
    pub currency: String,
    pub source_updated: Option<DateTime<Utc>>,
}

impl PriceRecord {
    /// Bare record with the documented defaults; handy for callers building rows by hand.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ext_station_id: None,
            state: None,
            brand: None,
            station_name: None,
            address: None,
            lat: None,
            lng: None,
            fuel_type: UNKNOWN_FUEL.to_string(),
            price: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            source_updated: None,
        }
    }
}

/// Anything that can hand back a raw, shape-unstable price payload.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_raw(&self) -> Result<Value>;
    fn name(&self) -> &'static str;
}
