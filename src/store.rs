// src/store.rs
//! # Price Store
//!
//! SQLite history of normalized prices, one row per natural key
//! `(source, ext_station_id, fuel_type, source_updated)`.
//!
//! - `upsert` runs the whole batch in one transaction: all records land or none do.
//! - Key matching is NULL-safe (`IS`), so items without a station id or
//!   origin timestamp still collapse onto one row on re-fetch.
//! - On a key match only the mutable attributes and `fetched_at` change.
//! - Timestamps are stored as unix milliseconds.
//!
//! Writers are serialized by SQLite itself (WAL + busy timeout); there is no
//! extra locking here.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqlitePool,
};
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::{debug, info};

use crate::ingest::types::PriceRecord;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data.db";
pub const DEFAULT_QUERY_LIMIT: u32 = 5_000;

/// Where and how to open the database. Built by the caller; the store never reads env.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `sqlite://<path>` (relative or absolute) or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// A persisted row: the record plus its surrogate id and write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrice {
    pub id: i64,
    #[serde(flatten)]
    pub record: PriceRecord,
    pub fetched_at: DateTime<Utc>,
}

/// Conjunctive filters; `None` (or an empty string) disables a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub state: Option<String>,
    pub fuel_type: Option<String>,
    /// Inclusive lower bound on `fetched_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `fetched_at`.
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl Default for PriceQuery {
    fn default() -> Self {
        Self {
            state: None,
            fuel_type: None,
            start: None,
            end: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    id: i64,
    source: String,
    ext_station_id: Option<String>,
    state: Option<String>,
    brand: Option<String>,
    station_name: Option<String>,
    address: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    fuel_type: String,
    price: f64,
    currency: String,
    source_updated: Option<i64>,
    fetched_at: i64,
}

impl From<PriceRow> for StoredPrice {
    fn from(r: PriceRow) -> Self {
        Self {
            id: r.id,
            record: PriceRecord {
                source: r.source,
                ext_station_id: r.ext_station_id,
                state: r.state,
                brand: r.brand,
                station_name: r.station_name,
                address: r.address,
                lat: r.lat,
                lng: r.lng,
                fuel_type: r.fuel_type,
                price: r.price,
                currency: r.currency,
                source_updated: r.source_updated.map(from_ms),
            },
            fetched_at: from_ms(r.fetched_at),
        }
    }
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

const SCHEMA: [&str; 2] = [
    r#"
      CREATE TABLE IF NOT EXISTS prices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        ext_station_id TEXT NULL,
        state TEXT NULL,
        brand TEXT NULL,
        station_name TEXT NULL,
        address TEXT NULL,
        lat REAL NULL,
        lng REAL NULL,
        fuel_type TEXT NOT NULL,
        price REAL NOT NULL,
        currency TEXT NOT NULL DEFAULT 'AUD',
        source_updated INTEGER NULL,
        fetched_at INTEGER NOT NULL,
        CONSTRAINT uq_source_station_fuel_time
          UNIQUE (source, ext_station_id, fuel_type, source_updated)
      )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_prices_fetched_at ON prices(fetched_at)"#,
];

const UPDATE_BY_KEY: &str = r#"
      UPDATE prices
      SET price = ?1, brand = ?2, station_name = ?3, address = ?4,
          lat = ?5, lng = ?6, fetched_at = ?7
      WHERE source = ?8
        AND ext_station_id IS ?9
        AND fuel_type = ?10
        AND source_updated IS ?11
    "#;

const INSERT: &str = r#"
      INSERT INTO prices(
        source, ext_station_id, state, brand, station_name, address,
        lat, lng, fuel_type, price, currency, source_updated, fetched_at
      ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6,
        ?7, ?8, ?9, ?10, ?11, ?12, ?13
      )
    "#;

const SELECT_COLUMNS: &str = "SELECT id, source, ext_station_id, state, brand, station_name, \
     address, lat, lng, fuel_type, price, currency, source_updated, fetched_at FROM prices";

#[derive(Debug, Clone)]
pub struct PriceStore {
    pool: SqlitePool,
}

impl PriceStore {
    /// Connect and make sure the table exists.
    pub async fn open(cfg: &StoreConfig) -> Result<Self> {
        let store = Self::connect(cfg).await?;
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn connect(cfg: &StoreConfig) -> Result<Self> {
        let (opts, in_memory) = connect_options(cfg)?;
        let pool = if in_memory {
            // Every connection to :memory: is its own database; pin a single one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(opts)
                .await
        } else {
            SqlitePoolOptions::new()
                .max_connections(cfg.max_connections.max(1))
                .connect_with(opts)
                .await
        }
        .with_context(|| format!("db connect error ({})", cfg.url))?;
        Ok(Self { pool })
    }

    /// Idempotent: safe to call on every start.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context("migrate error (ddl)")?;
        }
        info!(target: "store", "prices schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert-or-update every record, stamping `fetched_at` with the current time.
    /// Returns the number of records processed (inserts and updates both count).
    pub async fn upsert(&self, records: &[PriceRecord]) -> Result<usize> {
        self.upsert_at(records, Utc::now()).await
    }

    pub async fn upsert_at(&self, records: &[PriceRecord], now: DateTime<Utc>) -> Result<usize> {
        let now_ms = now.timestamp_millis();
        let mut tx = self.pool.begin().await.context("upsert: tx begin")?;

        let mut inserted = 0usize;
        for rec in records {
            let source_updated = rec.source_updated.map(|t| t.timestamp_millis());

            let updated = sqlx::query(UPDATE_BY_KEY)
                .bind(rec.price)
                .bind(rec.brand.as_deref())
                .bind(rec.station_name.as_deref())
                .bind(rec.address.as_deref())
                .bind(rec.lat)
                .bind(rec.lng)
                .bind(now_ms)
                .bind(rec.source.as_str())
                .bind(rec.ext_station_id.as_deref())
                .bind(rec.fuel_type.as_str())
                .bind(source_updated)
                .execute(&mut *tx)
                .await
                .context("upsert: update by key")?
                .rows_affected();
            if updated > 0 {
                continue;
            }

            sqlx::query(INSERT)
                .bind(rec.source.as_str())
                .bind(rec.ext_station_id.as_deref())
                .bind(rec.state.as_deref())
                .bind(rec.brand.as_deref())
                .bind(rec.station_name.as_deref())
                .bind(rec.address.as_deref())
                .bind(rec.lat)
                .bind(rec.lng)
                .bind(rec.fuel_type.as_str())
                .bind(rec.price)
                .bind(rec.currency.as_str())
                .bind(source_updated)
                .bind(now_ms)
                .execute(&mut *tx)
                .await
                .context("upsert: insert")?;
            inserted += 1;
        }

        tx.commit().await.context("upsert: tx commit")?;
        debug!(
            target: "store",
            processed = records.len(),
            inserted,
            updated = records.len() - inserted,
            "upsert batch committed"
        );
        Ok(records.len())
    }

    /// Newest first by `fetched_at`, capped at `q.limit`.
    pub async fn query(&self, q: &PriceQuery) -> Result<Vec<StoredPrice>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        qb.push(" WHERE 1 = 1");
        if let Some(state) = non_empty(&q.state) {
            qb.push(" AND state = ").push_bind(state.to_string());
        }
        if let Some(fuel) = non_empty(&q.fuel_type) {
            qb.push(" AND fuel_type = ").push_bind(fuel.to_string());
        }
        if let Some(start) = q.start {
            qb.push(" AND fetched_at >= ").push_bind(start.timestamp_millis());
        }
        if let Some(end) = q.end {
            qb.push(" AND fetched_at <= ").push_bind(end.timestamp_millis());
        }
        qb.push(" ORDER BY fetched_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(q.limit));

        let rows = qb
            .build_query_as::<PriceRow>()
            .fetch_all(&self.pool)
            .await
            .context("query prices")?;
        Ok(rows.into_iter().map(StoredPrice::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM prices")
            .fetch_one(&self.pool)
            .await
            .context("count prices")
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts `sqlite://<path>`, `sqlite:<path>` and `sqlite::memory:`.
/// Creates the parent directory of a file database.
fn connect_options(cfg: &StoreConfig) -> Result<(SqliteConnectOptions, bool)> {
    let url = cfg.url.trim();
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| anyhow!("unsupported database url {url}: expected sqlite://<path>"))?;

    if rest.is_empty() || rest == ":memory:" {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("db connect options error")?;
        return Ok((opts, true));
    }

    let path = PathBuf::from(rest);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("db dir create error: {}", parent.display()))?;
    }

    let opts = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(cfg.busy_timeout);
    Ok((opts, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_forms() {
        let (_, mem) = connect_options(&StoreConfig::new("sqlite::memory:")).unwrap();
        assert!(mem);

        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/prices.db");
        let url = format!("sqlite://{}", nested.display());
        let (_, mem) = connect_options(&StoreConfig::new(url)).unwrap();
        assert!(!mem);
        assert!(nested.parent().unwrap().is_dir(), "parent dir created");

        assert!(connect_options(&StoreConfig::new("postgres://x")).is_err());
    }

    #[test]
    fn default_query_limit_is_bounded() {
        assert_eq!(PriceQuery::default().limit, 5_000);
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = PriceStore::open(&StoreConfig::new("sqlite::memory:"))
            .await
            .unwrap();
        let mut rec = PriceRecord::new("projectzerothree");
        rec.ext_station_id = Some("1".into());
        rec.price = 1.9;
        assert_eq!(store.upsert(&[rec.clone()]).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);

        let rows = store.query(&PriceQuery::default()).await.unwrap();
        assert_eq!(rows[0].record, rec);
    }
}
