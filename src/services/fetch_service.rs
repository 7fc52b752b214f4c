use tracing::{info, warn};

use crate::external::price_provider::{FetchError, OutputSize, PriceProvider, RawSeries};
use crate::services::throttle::Throttle;

/// One symbol's fetch result, kept in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFetch {
    pub symbol: String,
    pub result: Result<RawSeries, FetchError>,
}

/// Fetches every symbol strictly one after another, in input order.
///
/// A failed symbol is recorded and the batch moves on.
pub async fn fetch_all(
    provider: &dyn PriceProvider,
    symbols: &[String],
    output_size: OutputSize,
    throttle: &Throttle,
) -> Vec<SymbolFetch> {
    let mut out = Vec::with_capacity(symbols.len());

    for (i, symbol) in symbols.iter().enumerate() {
        throttle.acquire().await;
        info!("Processing {} ({}/{})...", symbol, i + 1, symbols.len());

        let result = provider.fetch_series(symbol, output_size).await;
        if let Err(e) = &result {
            warn!("Skipping {}: {}", symbol, e);
        }

        out.push(SymbolFetch {
            symbol: symbol.clone(),
            result,
        });
    }

    out
}
