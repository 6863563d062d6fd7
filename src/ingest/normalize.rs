// src/ingest/normalize.rs
//! Payload → canonical [`PriceRecord`]s.
//!
//! The upstream API has changed shape over time, so nothing here assumes a
//! schema: the item array is located through a list of container keys and
//! each field is probed through its own ordered list of candidate keys
//! (see [`FieldAliases`]). The transform is pure; logging is the only side effect.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ingest::config::FieldAliases;
use crate::ingest::types::{PriceRecord, DEFAULT_CURRENCY, PZT_SOURCE, UNKNOWN_FUEL};

/// Offset-less layouts tried after RFC 3339 and `%z`; parsed values are taken as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Why a single item was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("item is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub index: usize,
    pub error: FieldError,
}

/// Outcome of one normalization pass.
///
/// `recognized == false` means no item array was found; the caller should show
/// the raw payload instead of treating the empty result as "no prices".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub records: Vec<PriceRecord>,
    pub skipped: Vec<SkippedItem>,
    pub recognized: bool,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    source: String,
    aliases: FieldAliases,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(PZT_SOURCE, FieldAliases::default())
    }
}

impl Normalizer {
    pub fn new(source: impl Into<String>, aliases: FieldAliases) -> Self {
        Self {
            source: source.into(),
            aliases,
        }
    }

    pub fn normalize(&self, payload: &Value) -> Vec<PriceRecord> {
        self.normalize_with_report(payload).records
    }

    /// Items that fail coercion are skipped (and logged); the rest of the batch continues.
    pub fn normalize_with_report(&self, payload: &Value) -> NormalizeReport {
        let Some(items) = self.locate_items(payload) else {
            tracing::debug!(target: "ingest", source = %self.source, "payload shape not recognized");
            return NormalizeReport::default();
        };

        let mut report = NormalizeReport {
            records: Vec::with_capacity(items.len()),
            skipped: Vec::new(),
            recognized: true,
        };
        for (index, item) in items.iter().enumerate() {
            match self.normalize_item(item) {
                Ok(rec) => report.records.push(rec),
                Err(error) => {
                    tracing::warn!(
                        target: "ingest",
                        source = %self.source,
                        index,
                        %error,
                        "skipping price item"
                    );
                    report.skipped.push(SkippedItem { index, error });
                }
            }
        }
        report
    }

    fn locate_items<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
        match payload {
            Value::Array(items) => Some(items),
            Value::Object(map) => self
                .aliases
                .containers
                .iter()
                .find_map(|k| map.get(k).and_then(Value::as_array)),
            _ => None,
        }
    }

    pub fn normalize_item(&self, item: &Value) -> Result<PriceRecord, FieldError> {
        let obj = item.as_object().ok_or(FieldError::NotAnObject)?;
        let a = &self.aliases;

        let price = match first_present(obj, &a.price) {
            Some(v) => coerce_f64("price", v)?,
            None => 0.0,
        };
        let lat = first_present(obj, &a.lat)
            .map(|v| coerce_f64("lat", v))
            .transpose()?;
        let lng = first_present(obj, &a.lng)
            .map(|v| coerce_f64("lng", v))
            .transpose()?;

        Ok(PriceRecord {
            source: self.source.clone(),
            ext_station_id: first_present(obj, &a.ext_station_id).map(scalar_to_string),
            state: first_present(obj, &a.state).map(|v| scalar_to_string(v).to_uppercase()),
            brand: first_present(obj, &a.brand).map(scalar_to_string),
            station_name: first_present(obj, &a.station_name).map(scalar_to_string),
            address: first_present(obj, &a.address).map(scalar_to_string),
            lat,
            lng,
            fuel_type: first_present(obj, &a.fuel_type)
                .map(|v| scalar_to_string(v).to_uppercase())
                .unwrap_or_else(|| UNKNOWN_FUEL.to_string()),
            price,
            currency: first_present(obj, &a.currency)
                .map(scalar_to_string)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            source_updated: first_present(obj, &a.source_updated)
                .and_then(Value::as_str)
                .and_then(parse_source_timestamp),
        })
    }
}

/// Normalize with the built-in Project Zero Three key table.
pub fn normalize(payload: &Value) -> Vec<PriceRecord> {
    Normalizer::default().normalize(payload)
}

/// First candidate key holding a usable value. Null and blank strings count as missing.
pub fn first_present<'a>(obj: &'a Map<String, Value>, candidates: &[String]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|k| obj.get(k))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn coerce_f64(field: &'static str, v: &Value) -> Result<f64, FieldError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|x| x.is_finite())
        .ok_or_else(|| FieldError::NotNumeric {
            field,
            value: v.to_string(),
        })
}

/// Parse the origin's "last updated" string. First matching layout wins; `None` if none match.
pub fn parse_source_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let out = normalize(&json!([{ "station_id": 7 }]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price, 0.0);
        assert_eq!(out[0].fuel_type, "UNKNOWN");
        assert_eq!(out[0].currency, "AUD");
        assert_eq!(out[0].ext_station_id.as_deref(), Some("7"));
        assert_eq!(out[0].state, None);
    }

    #[test]
    fn alternate_keys_are_probed_in_order() {
        let item = json!({
            "State": "vic",
            "region": "nsw",
            "SiteName": "Fuel Co",
            "FuelType": "u91",
            "Price": "1.799",
            "latitude": "-37.8",
            "longitude": 144.9,
        });
        let rec = Normalizer::default().normalize_item(&item).unwrap();
        assert_eq!(rec.state.as_deref(), Some("VIC"));
        assert_eq!(rec.station_name.as_deref(), Some("Fuel Co"));
        assert_eq!(rec.fuel_type, "U91");
        assert!((rec.price - 1.799).abs() < 1e-9);
        assert_eq!(rec.lat, Some(-37.8));
        assert_eq!(rec.lng, Some(144.9));
    }

    #[test]
    fn null_and_blank_values_fall_through() {
        let item = json!({ "state": null, "State": "  ", "region": "qld", "price": "" });
        let rec = Normalizer::default().normalize_item(&item).unwrap();
        assert_eq!(rec.state.as_deref(), Some("QLD"));
        assert_eq!(rec.price, 0.0);
    }

    #[test]
    fn non_numeric_price_skips_only_that_item() {
        let payload = json!([
            { "id": "a", "price": "1.50" },
            { "id": "b", "price": "call us" },
            { "id": "c", "price": 1.60 },
        ]);
        let report = Normalizer::default().normalize_with_report(&payload);
        assert!(report.recognized);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert!(matches!(
            report.skipped[0].error,
            FieldError::NotNumeric { field: "price", .. }
        ));
    }

    #[test]
    fn non_object_items_are_skipped() {
        let report = Normalizer::default().normalize_with_report(&json!([1, { "id": 2 }]));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped[0].error, FieldError::NotAnObject);
    }

    #[test]
    fn container_with_non_array_value_is_passed_over() {
        let payload = json!({ "items": "nope", "data": [{ "id": 1 }] });
        assert_eq!(normalize(&payload).len(), 1);
    }

    #[test]
    fn timestamp_layouts() {
        let want = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_source_timestamp("2024-05-01T08:30:00"), Some(want));
        assert_eq!(parse_source_timestamp("2024-05-01 08:30:00"), Some(want));
        assert_eq!(parse_source_timestamp("2024-05-01T18:30:00+1000"), Some(want));
        assert_eq!(parse_source_timestamp("2024-05-01T18:30:00+10:00"), Some(want));
        assert_eq!(parse_source_timestamp("2024-05-01T08:30:00Z"), Some(want));
        assert_eq!(parse_source_timestamp("yesterday"), None);
    }

    #[test]
    fn numeric_timestamp_is_ignored() {
        let rec = Normalizer::default()
            .normalize_item(&json!({ "timestamp": 1714552200 }))
            .unwrap();
        assert_eq!(rec.source_updated, None);
    }
}
