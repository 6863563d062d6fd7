// src/processor.rs
//! Selection helpers over normalized records and stored rows.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ingest::types::PriceRecord;
use crate::store::StoredPrice;

/// Case-insensitive exact match on `state`. Records without a state never match.
pub fn filter_by_state(records: Vec<PriceRecord>, state: &str) -> Vec<PriceRecord> {
    records
        .into_iter()
        .filter(|r| r.state.as_deref().unwrap_or_default().eq_ignore_ascii_case(state))
        .collect()
}

/// Case-insensitive exact match on `fuel_type`.
pub fn filter_by_fuel(records: Vec<PriceRecord>, fuel: &str) -> Vec<PriceRecord> {
    records
        .into_iter()
        .filter(|r| r.fuel_type.eq_ignore_ascii_case(fuel))
        .collect()
}

/// Cheapest `n` by price, ascending. Ties keep their input order (stable sort).
pub fn top_n_cheapest(mut records: Vec<PriceRecord>, n: usize) -> Vec<PriceRecord> {
    records.sort_by(|a, b| a.price.total_cmp(&b.price));
    records.truncate(n);
    records
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMin {
    pub day: NaiveDate,
    pub fuel_type: String,
    pub price: f64,
}

/// Cheapest price per UTC day (of `fetched_at`) and fuel type, ordered by day then fuel.
pub fn daily_minimums(rows: &[StoredPrice]) -> Vec<DailyMin> {
    let mut mins: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for row in rows {
        let key = (row.fetched_at.date_naive(), row.record.fuel_type.as_str());
        mins.entry(key)
            .and_modify(|p| *p = p.min(row.record.price))
            .or_insert(row.record.price);
    }
    mins.into_iter()
        .map(|((day, fuel), price)| DailyMin {
            day,
            fuel_type: fuel.to_string(),
            price,
        })
        .collect()
}
