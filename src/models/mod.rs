mod price_point;
mod analytics;

pub use price_point::{PricePoint, UpsertSummary};
pub use analytics::{AnalyticsReport, DailyChange, LatestPrice, TableStats};
