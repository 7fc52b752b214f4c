use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::external::price_provider::RawSeries;
use crate::models::PricePoint;

const OPEN: &str = "1. open";
const HIGH: &str = "2. high";
const LOW: &str = "3. low";
const CLOSE: &str = "4. close";
const VOLUME: &str = "5. volume";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("entry is not an object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not numeric: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Converts a raw series into points, ascending by date.
///
/// Each day stands alone: a bad day is logged and dropped, the rest survive.
pub fn parse_series(symbol: &str, series: &RawSeries, ingested_at: DateTime<Utc>) -> Vec<PricePoint> {
    let mut points = Vec::with_capacity(series.len());

    for (date_str, entry) in &series.days {
        match parse_day(symbol, date_str, entry, ingested_at) {
            Ok(point) => points.push(point),
            Err(e) => warn!("Error parsing {} on {}: {}", symbol, date_str, e),
        }
    }

    // BTreeMap keys are ISO dates, but sort on the parsed value anyway.
    points.sort_by_key(|p| p.date);

    info!("Parsed {} of {} records for {}", points.len(), series.len(), symbol);
    points
}

pub fn parse_day(
    symbol: &str,
    date_str: &str,
    entry: &Value,
    ingested_at: DateTime<Utc>,
) -> Result<PricePoint, ParseError> {
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| ParseError::InvalidDate(date_str.to_string()))?;

    let fields = entry.as_object().ok_or(ParseError::NotAnObject)?;
    let field = |name: &'static str| fields.get(name).ok_or(ParseError::MissingField(name));

    Ok(PricePoint {
        symbol: symbol.to_string(),
        date,
        open: price(OPEN, field(OPEN)?)?,
        high: price(HIGH, field(HIGH)?)?,
        low: price(LOW, field(LOW)?)?,
        close: price(CLOSE, field(CLOSE)?)?,
        volume: volume(field(VOLUME)?)?,
        ingested_at,
    })
}

fn invalid(field: &'static str, value: &Value) -> ParseError {
    ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    }
}

fn price(field: &'static str, value: &Value) -> Result<f64, ParseError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(field, value))
}

fn volume(value: &Value) -> Result<i64, ParseError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };

    parsed.ok_or_else(|| invalid(VOLUME, value))
}
