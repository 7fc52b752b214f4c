//! In-process doubles for the provider and the store, shared by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde_json::json;

use crate::errors::PersistenceError;
use crate::external::price_provider::{FetchError, OutputSize, PriceProvider, RawSeries};
use crate::models::{PricePoint, TableStats, UpsertSummary};
use crate::store::PriceStore;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn point(symbol: &str, day: &str, close: f64) -> PricePoint {
    PricePoint {
        symbol: symbol.to_string(),
        date: date(day),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000,
        ingested_at: Utc::now(),
    }
}

/// Provider-shaped series with one entry per `(date, close)`.
pub fn raw_series(days: &[(&str, &str)]) -> RawSeries {
    RawSeries {
        days: days
            .iter()
            .map(|(d, close)| {
                (
                    d.to_string(),
                    json!({
                        "1. open": close,
                        "2. high": close,
                        "3. low": close,
                        "4. close": close,
                        "5. volume": "1000",
                    }),
                )
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    responses: HashMap<String, Result<RawSeries, FetchError>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, symbol: &str, result: Result<RawSeries, FetchError>) -> Self {
        self.responses.insert(symbol.to_string(), result);
        self
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    async fn fetch_series(&self, symbol: &str, _output_size: OutputSize) -> Result<RawSeries, FetchError> {
        self.calls.lock().push(symbol.to_string());
        self.responses
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::UpstreamData(format!("no script for {}", symbol))))
    }
}

/// Keyed by `(symbol, date)`, so the uniqueness constraint holds by
/// construction; batches apply all-or-nothing.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, NaiveDate), PricePoint>>,
    failing_commits: Mutex<HashSet<String>>,
    ping_fails: AtomicBool,
    schema_fails: AtomicBool,
    reads_fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<PricePoint>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.lock();
            for p in points {
                rows.insert((p.symbol.clone(), p.date), p);
            }
        }
        store
    }

    pub fn fail_commit_for(&self, symbol: &str) {
        self.failing_commits.lock().insert(symbol.to_string());
    }

    pub fn fail_ping(&self) {
        self.ping_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_schema(&self) {
        self.schema_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.reads_fail.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn count_for(&self, symbol: &str) -> usize {
        self.rows.lock().keys().filter(|(s, _)| s == symbol).count()
    }

    pub fn get(&self, symbol: &str, day: &str) -> Option<PricePoint> {
        self.rows.lock().get(&(symbol.to_string(), date(day))).cloned()
    }

    fn unavailable() -> PersistenceError {
        PersistenceError::Database(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn ping(&self) -> Result<(), PersistenceError> {
        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        if self.schema_fails.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn upsert_batch(&self, points: &[PricePoint]) -> Result<UpsertSummary, PersistenceError> {
        let mut rows = self.rows.lock();
        let mut staged = rows.clone();
        let mut summary = UpsertSummary::default();

        for p in points {
            let (symbol, date) = p.key();
            let key = (symbol.to_string(), date);
            if staged.contains_key(&key) {
                summary.skipped += 1;
            } else {
                staged.insert(key, p.clone());
                summary.stored += 1;
            }
        }

        if let Some(p) = points.first() {
            if self.failing_commits.lock().contains(&p.symbol) {
                return Err(PersistenceError::RolledBack {
                    symbol: p.symbol.clone(),
                    reason: "commit failed".to_string(),
                });
            }
        }

        *rows = staged;
        Ok(summary)
    }

    async fn latest_two(&self, symbol: &str) -> Result<Vec<PricePoint>, PersistenceError> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|p| p.symbol == symbol)
            .rev()
            .take(2)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<TableStats, PersistenceError> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let rows = self.rows.lock();
        let symbols: HashSet<&str> = rows.keys().map(|(s, _)| s.as_str()).collect();
        Ok(TableStats {
            total_records: rows.len() as i64,
            unique_symbols: symbols.len() as i64,
            earliest_date: rows.values().map(|p| p.date).min(),
            latest_date: rows.values().map(|p| p.date).max(),
        })
    }
}
