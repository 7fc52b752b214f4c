use tracing::{debug, error, info, warn};

use crate::models::{AnalyticsReport, DailyChange, LatestPrice};
use crate::store::PriceStore;

/// Best-effort analytics over what is stored. Failures become warnings; the
/// report is always returned.
pub async fn build_report(store: &dyn PriceStore, symbols: &[String]) -> AnalyticsReport {
    let mut report = AnalyticsReport::default();

    match store.stats().await {
        Ok(stats) => report.stats = Some(stats),
        Err(e) => {
            error!("Error reading table stats: {}", e);
            report.warnings.push(format!("table stats unavailable: {}", e));
        }
    }

    for symbol in symbols {
        let mut points = match store.latest_two(symbol).await {
            Ok(points) => points,
            Err(e) => {
                error!("Error reading latest prices for {}: {}", symbol, e);
                report.warnings.push(format!("{}: {}", symbol, e));
                continue;
            }
        };

        // Newest first, by calendar date.
        points.sort_by(|a, b| b.date.cmp(&a.date));

        match points.as_slice() {
            [] => debug!("No stored prices for {}", symbol),
            [latest] => report.latest.push(LatestPrice::from(latest)),
            [latest, previous, ..] => {
                report.latest.push(LatestPrice::from(latest));
                match DailyChange::between(latest, previous) {
                    Some(change) => report.changes.push(change),
                    None => {
                        warn!("Cannot compute change for {}: previous close is {}", symbol, previous.close);
                        report
                            .warnings
                            .push(format!("{}: previous close is {}, change undefined", symbol, previous.close));
                    }
                }
            }
        }
    }

    info!(
        "Report built: {} latest prices, {} changes, {} warnings",
        report.latest.len(),
        report.changes.len(),
        report.warnings.len()
    );
    report
}
