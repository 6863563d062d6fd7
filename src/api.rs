// src/api.rs
//! Dashboard HTTP surface: fetch the feed, preview it, persist it, browse history.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::ingest::types::{PriceRecord, PriceSource};
use crate::ingest::{fetch_payload, save_payload, selector, try_snapshot, IngestReport, Normalizer};
use crate::processor::{daily_minimums, filter_by_fuel, filter_by_state, top_n_cheapest, DailyMin};
use crate::store::{PriceQuery, PriceStore, StoredPrice, DEFAULT_QUERY_LIMIT};

/// Items shown by `/raw` when the payload is a bare list.
const RAW_PREVIEW_ITEMS: usize = 25;
const DEFAULT_CHEAPEST_N: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub store: PriceStore,
    pub source: Arc<dyn PriceSource>,
    pub normalizer: Arc<Normalizer>,
    /// Last successfully fetched payload, kept until the next fetch.
    pub last_payload: Arc<RwLock<Option<Value>>>,
    pub snapshot_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        store: PriceStore,
        source: Arc<dyn PriceSource>,
        normalizer: Normalizer,
        snapshot_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            source,
            normalizer: Arc::new(normalizer),
            last_payload: Arc::new(RwLock::new(None)),
            snapshot_dir,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/fetch", post(fetch))
        .route("/raw", get(raw_preview))
        .route("/save", post(save))
        .route("/history", get(history))
        .route("/history/daily-min", get(history_daily_min))
        .route("/cheapest", get(cheapest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!(target: "api", error = ?e, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    }
}

#[derive(Serialize)]
struct FetchResp {
    fetched: bool,
    /// Top-level item count when the payload is a bare list.
    items: Option<usize>,
    snapshot: Option<PathBuf>,
}

async fn fetch(State(state): State<AppState>) -> Result<Json<FetchResp>, ApiError> {
    let Some(payload) = fetch_payload(state.source.as_ref()).await else {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            format!("Fetch error: {} is unavailable", state.source.name()),
        ));
    };

    let snapshot = state
        .snapshot_dir
        .as_deref()
        .and_then(|dir| try_snapshot(&payload, dir));
    let items = payload.as_array().map(Vec::len);
    *state.last_payload.write().await = Some(payload);

    Ok(Json(FetchResp {
        fetched: true,
        items,
        snapshot,
    }))
}

async fn raw_preview(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let guard = state.last_payload.read().await;
    match guard.as_ref() {
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "No payload fetched yet.")),
        Some(Value::Array(items)) => Ok(Json(Value::Array(
            items.iter().take(RAW_PREVIEW_ITEMS).cloned().collect(),
        ))),
        Some(other) => Ok(Json(other.clone())),
    }
}

#[derive(Debug, Default, Deserialize)]
struct SaveReq {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    fuel: Option<String>,
}

async fn save(
    State(state): State<AppState>,
    req: Option<Json<SaveReq>>,
) -> Result<Json<IngestReport>, ApiError> {
    // No JSON body means no filters.
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let guard = state.last_payload.read().await;
    let Some(payload) = guard.as_ref() else {
        return Err(ApiError::new(StatusCode::CONFLICT, "Fetch data first."));
    };

    let report = save_payload(
        payload,
        &state.normalizer,
        &state.store,
        req.state.as_deref(),
        req.fuel.as_deref(),
    )
    .await?;
    if !report.recognized {
        tracing::warn!(target: "api", "payload format not recognized; inspect /raw");
    }
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    state: Option<String>,
    fuel: Option<String>,
    /// UTC day, inclusive.
    start: Option<NaiveDate>,
    /// UTC day, inclusive (the whole day counts).
    end: Option<NaiveDate>,
    limit: Option<u32>,
}

impl HistoryParams {
    fn to_query(&self) -> PriceQuery {
        PriceQuery {
            state: selector(self.state.as_deref()).map(str::to_uppercase),
            fuel_type: selector(self.fuel.as_deref()).map(str::to_uppercase),
            start: self.start.and_then(start_of_day),
            end: self.end.and_then(end_of_day),
            limit: self.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
        }
    }
}

fn start_of_day(d: NaiveDate) -> Option<DateTime<Utc>> {
    d.and_hms_opt(0, 0, 0).map(|t| t.and_utc())
}

fn end_of_day(d: NaiveDate) -> Option<DateTime<Utc>> {
    d.and_hms_milli_opt(23, 59, 59, 999).map(|t| t.and_utc())
}

#[derive(Serialize)]
struct HistoryResp<T> {
    count: usize,
    rows: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl<T> HistoryResp<T> {
    fn new(rows: Vec<T>) -> Self {
        Self {
            count: rows.len(),
            message: rows
                .is_empty()
                .then_some("No records found for that query."),
            rows,
        }
    }
}

async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResp<StoredPrice>>, ApiError> {
    let rows = state.store.query(&params.to_query()).await?;
    Ok(Json(HistoryResp::new(rows)))
}

async fn history_daily_min(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResp<DailyMin>>, ApiError> {
    let rows = state.store.query(&params.to_query()).await?;
    Ok(Json(HistoryResp::new(daily_minimums(&rows))))
}

#[derive(Debug, Default, Deserialize)]
struct CheapestParams {
    state: Option<String>,
    fuel: Option<String>,
    n: Option<usize>,
}

async fn cheapest(
    State(state): State<AppState>,
    Query(params): Query<CheapestParams>,
) -> Result<Json<Vec<PriceRecord>>, ApiError> {
    let guard = state.last_payload.read().await;
    let Some(payload) = guard.as_ref() else {
        return Err(ApiError::new(StatusCode::CONFLICT, "Fetch data first."));
    };

    let mut records = state.normalizer.normalize(payload);
    if let Some(s) = selector(params.state.as_deref()) {
        records = filter_by_state(records, s);
    }
    if let Some(f) = selector(params.fuel.as_deref()) {
        records = filter_by_fuel(records, f);
    }
    Ok(Json(top_n_cheapest(
        records,
        params.n.unwrap_or(DEFAULT_CHEAPEST_N),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_params_cover_whole_days_and_uppercase_filters() {
        let p = HistoryParams {
            state: Some("nsw".into()),
            fuel: Some("ANY".into()),
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 2),
            limit: None,
        };
        let q = p.to_query();
        assert_eq!(q.state.as_deref(), Some("NSW"));
        assert_eq!(q.fuel_type, None);
        assert_eq!(q.start.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(
            q.end.unwrap().timestamp_millis() + 1,
            NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp_millis()
        );
        assert_eq!(q.limit, DEFAULT_QUERY_LIMIT);
    }
}
