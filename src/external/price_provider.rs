use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Size of the historical window requested per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSize {
    /// Latest ~100 trading days.
    #[default]
    Compact,
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            other => Err(format!("unknown output size '{}' (expected compact or full)", other)),
        }
    }
}

/// Raw per-day series as returned by the provider, keyed by `YYYY-MM-DD`.
///
/// Days are kept untyped; the parser decides per entry whether it is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub days: BTreeMap<String, Value>,
}

impl RawSeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream data error: {0}")]
    UpstreamData(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::UpstreamData(_) => "upstream_data",
            FetchError::Transport(_) => "transport",
        }
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_series(
        &self,
        symbol: &str,
        output_size: OutputSize,
    ) -> Result<RawSeries, FetchError>;
}
