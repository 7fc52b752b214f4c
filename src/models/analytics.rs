use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::PricePoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub total_records: i64,
    pub unique_symbols: i64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPrice {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub volume: i64,
}

impl From<&PricePoint> for LatestPrice {
    fn from(p: &PricePoint) -> Self {
        Self {
            symbol: p.symbol.clone(),
            date: p.date,
            close: p.close,
            volume: p.volume,
        }
    }
}

/// Day-over-day move between the two most recent stored closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChange {
    pub symbol: String,
    pub latest_date: NaiveDate,
    pub latest_close: f64,
    pub previous_close: f64,
    pub change: f64,
    pub pct_change: f64,
}

impl DailyChange {
    /// Orders the two points by calendar date, whatever order they arrive in.
    /// Returns `None` when the previous close is zero or not finite.
    pub fn between(a: &PricePoint, b: &PricePoint) -> Option<Self> {
        let (latest, previous) = if a.date >= b.date { (a, b) } else { (b, a) };

        if previous.close == 0.0 || !previous.close.is_finite() {
            return None;
        }

        let change = latest.close - previous.close;
        Some(Self {
            symbol: latest.symbol.clone(),
            latest_date: latest.date,
            latest_close: latest.close,
            previous_close: previous.close,
            change,
            pct_change: change / previous.close * 100.0,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub stats: Option<TableStats>,
    pub latest: Vec<LatestPrice>,
    pub changes: Vec<DailyChange>,
    pub warnings: Vec<String>,
}

impl AnalyticsReport {
    /// Plain-text tables for stdout.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("FINANCIAL ANALYTICS REPORT\n");
        out.push_str(&format!("{:=<70}\n", ""));

        if let Some(stats) = &self.stats {
            let range = match (stats.earliest_date, stats.latest_date) {
                (Some(start), Some(end)) => format!("{} to {}", start, end),
                _ => "n/a".to_string(),
            };
            out.push_str("\nDatabase Overview:\n");
            out.push_str(&format!("   Total Records: {}\n", stats.total_records));
            out.push_str(&format!("   Symbols Tracked: {}\n", stats.unique_symbols));
            out.push_str(&format!("   Date Range: {}\n", range));
        }

        out.push_str("\nLatest Stock Prices:\n");
        out.push_str(&format!(
            "{:<10} {:<12} {:<15} {:>15}\n",
            "Symbol", "Date", "Close Price", "Volume"
        ));
        out.push_str(&format!("{:-<60}\n", ""));
        for p in &self.latest {
            out.push_str(&format!(
                "{:<10} {:<12} {:<15} {:>15}\n",
                p.symbol,
                p.date.format("%Y-%m-%d").to_string(),
                format!("${:.2}", p.close),
                group_thousands(p.volume)
            ));
        }

        out.push_str("\nPerformance Metrics:\n");
        out.push_str(&format!(
            "{:<10} {:<15} {:<15}\n",
            "Symbol", "Daily Change", "% Change"
        ));
        out.push_str(&format!("{:-<45}\n", ""));
        for c in &self.changes {
            let change = round_cents(c.change);
            let sign = if change < 0.0 { "-" } else { "+" };
            out.push_str(&format!(
                "{:<10} {:<15} {:<15}\n",
                c.symbol,
                format!("{}${:.2}", sign, change.abs()),
                format!("{:+.2}%", round_cents(c.pct_change))
            ));
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for w in &self.warnings {
                out.push_str(&format!("   {}\n", w));
            }
        }

        out
    }
}

/// Rounds to two decimals; anything that rounds to zero comes back as +0.0.
fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
