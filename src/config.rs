use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::errors::AppError;
use crate::external::alphavantage::DEFAULT_BASE_URL;
use crate::external::price_provider::OutputSize;

pub const DEFAULT_SYMBOLS: &[&str] = &["JPM", "BAC", "WFC", "GS", "MS"];
pub const DEFAULT_FETCH_DELAY_SECS: u64 = 12;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

// Keeps the credential out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub symbols: Vec<String>,
    pub fetch_delay: Duration,
    pub output_size: OutputSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            fetch_delay: Duration::from_secs(DEFAULT_FETCH_DELAY_SECS),
            output_size: OutputSize::Compact,
        }
    }
}

/// Everything the process needs, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    /// Six-field cron expression; `None` runs the pipeline once.
    pub schedule: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("ALPHAVANTAGE_API_KEY")
            .ok_or_else(|| AppError::Config("ALPHAVANTAGE_API_KEY not set".into()))?;
        let database_url = var("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL not set".into()))?;

        let base_url = var("ALPHAVANTAGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| AppError::Config(format!("ALPHAVANTAGE_BASE_URL is not a valid URL: {}", e)))?;

        let output_size = match var("OUTPUT_SIZE") {
            Some(v) => v.parse::<OutputSize>().map_err(AppError::Config)?,
            None => OutputSize::Compact,
        };

        let fetch_delay_secs = match var("FETCH_DELAY_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| AppError::Config(format!("FETCH_DELAY_SECS must be a whole number of seconds, got '{}'", v)))?,
            None => DEFAULT_FETCH_DELAY_SECS,
        };

        let max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(AppError::Config(format!("DB_MAX_CONNECTIONS must be a positive integer, got '{}'", v))),
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let symbols = match var("TRACKED_SYMBOLS") {
            Some(v) => parse_symbols(&v)?,
            None => PipelineConfig::default().symbols,
        };

        Ok(Self {
            provider: ProviderConfig { api_key, base_url },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            pipeline: PipelineConfig {
                symbols,
                fetch_delay: Duration::from_secs(fetch_delay_secs),
                output_size,
            },
            schedule: var("INGEST_CRON"),
        })
    }
}

/// Splits a comma list into upper-cased tickers, keeping first occurrences.
/// Tickers must fit the `VARCHAR(10)` symbol column.
pub fn parse_symbols(raw: &str) -> Result<Vec<String>, AppError> {
    let pattern = Regex::new(r"^[A-Z0-9.\-]{1,10}$")
        .map_err(|e| AppError::Config(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for part in raw.split(',') {
        let symbol = part.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !pattern.is_match(&symbol) {
            return Err(AppError::Config(format!("invalid ticker symbol '{}'", symbol)));
        }
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    if symbols.is_empty() {
        return Err(AppError::Config("TRACKED_SYMBOLS contains no symbols".into()));
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("ALPHAVANTAGE_API_KEY", "secret-key"),
        ("DATABASE_URL", "postgres://localhost/prices"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(config.pipeline.symbols, vec!["JPM", "BAC", "WFC", "GS", "MS"]);
        assert_eq!(config.pipeline.fetch_delay, Duration::from_secs(12));
        assert_eq!(config.pipeline.output_size, OutputSize::Compact);
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.schedule.is_none());
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("ALPHAVANTAGE_API_KEY")));
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("ALPHAVANTAGE_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("TRACKED_SYMBOLS", "aapl, msft ,AAPL,brk.b"),
            ("FETCH_DELAY_SECS", "0"),
            ("OUTPUT_SIZE", "FULL"),
            ("INGEST_CRON", "0 0 18 * * Mon-Fri"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.pipeline.symbols, vec!["AAPL", "MSFT", "BRK.B"]);
        assert_eq!(config.pipeline.fetch_delay, Duration::ZERO);
        assert_eq!(config.pipeline.output_size, OutputSize::Full);
        assert_eq!(config.schedule.as_deref(), Some("0 0 18 * * Mon-Fri"));
    }

    #[test]
    fn test_rejects_bad_values() {
        for (key, value) in [
            ("FETCH_DELAY_SECS", "soon"),
            ("OUTPUT_SIZE", "medium"),
            ("DB_MAX_CONNECTIONS", "0"),
            ("TRACKED_SYMBOLS", "TOOLONGSYMBOL"),
            ("TRACKED_SYMBOLS", " , "),
            ("ALPHAVANTAGE_BASE_URL", "not a url"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            assert!(
                matches!(AppConfig::from_lookup(lookup(&pairs)), Err(AppError::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup(REQUIRED)).unwrap();
        let printed = format!("{:?}", config);

        assert!(!printed.contains("secret-key"));
        assert!(!printed.contains("postgres://"));
    }
}
