use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// One ticker's trading data for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    #[sqlx(rename = "open_price")]
    pub open: f64,
    #[sqlx(rename = "high_price")]
    pub high: f64,
    #[sqlx(rename = "low_price")]
    pub low: f64,
    #[sqlx(rename = "close_price")]
    pub close: f64,
    pub volume: i64,
    #[sqlx(rename = "created_at")]
    pub ingested_at: DateTime<Utc>,
}

impl PricePoint {
    /// Storage key; unique across the whole table.
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.symbol.as_str(), self.date)
    }
}

/// Result of writing one symbol's batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub stored: usize,
    pub skipped: usize,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.stored + self.skipped
    }
}

impl std::ops::AddAssign for UpsertSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.stored += rhs.stored;
        self.skipped += rhs.skipped;
    }
}
