//! Setup → Ingest → Report.
//!
//! Only setup can abort a run. A symbol that fails to fetch or persist is
//! logged and counted, and the run moves on to the next symbol; reporting
//! errors end up as warnings in the report.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::external::price_provider::{FetchError, PriceProvider};
use crate::models::{AnalyticsReport, UpsertSummary};
use crate::services::fetch_service::fetch_all;
use crate::services::parser::parse_series;
use crate::services::report_service::build_report;
use crate::services::throttle::Throttle;
use crate::store::PriceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    SettingUp,
    Ingesting,
    Reporting,
    Done,
    Aborted,
}

impl PipelinePhase {
    pub fn can_advance_to(self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        matches!(
            (self, next),
            (Idle, SettingUp)
                | (SettingUp, Ingesting)
                | (SettingUp, Aborted)
                | (Ingesting, Reporting)
                | (Reporting, Done)
        )
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::SettingUp => "setting_up",
            PipelinePhase::Ingesting => "ingesting",
            PipelinePhase::Reporting => "reporting",
            PipelinePhase::Done => "done",
            PipelinePhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

struct PhaseTracker {
    history: Vec<PipelinePhase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            history: vec![PipelinePhase::Idle],
        }
    }

    fn current(&self) -> PipelinePhase {
        *self.history.last().unwrap_or(&PipelinePhase::Idle)
    }

    fn advance(&mut self, next: PipelinePhase) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal pipeline transition {} -> {}",
            current,
            next
        );
        info!("Pipeline phase: {} -> {}", current, next);
        self.history.push(next);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolStatus {
    Stored(UpsertSummary),
    FetchFailed(FetchError),
    PersistFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub fetched_days: usize,
    pub parsed_points: usize,
    pub status: SymbolStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub totals: UpsertSummary,
    pub failed_symbols: usize,
    pub symbols: Vec<SymbolOutcome>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    pub report: AnalyticsReport,
    pub phases: Vec<PipelinePhase>,
}

pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn PriceProvider>,
    store: Arc<dyn PriceStore>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn PriceProvider>,
        store: Arc<dyn PriceStore>,
    ) -> Self {
        info!(
            "Tracking {} symbols: {}",
            config.symbols.len(),
            config.symbols.join(", ")
        );
        Self {
            config,
            provider,
            store,
        }
    }

    /// Connectivity probe, then schema. Either failure is fatal.
    pub async fn setup(&self) -> Result<(), AppError> {
        info!("Setting up database...");

        self.store
            .ping()
            .await
            .map_err(|e| AppError::Setup(format!("database connection failed: {}", e)))?;

        self.store
            .ensure_schema()
            .await
            .map_err(|e| AppError::Setup(format!("table creation failed: {}", e)))?;

        info!("Database setup complete");
        Ok(())
    }

    /// Fetch every symbol, then parse and store each one in input order,
    /// one transaction per symbol.
    pub async fn ingest(&self) -> IngestSummary {
        info!("Starting data fetch and storage...");

        let throttle = Throttle::new(self.config.fetch_delay);
        let fetched = fetch_all(
            self.provider.as_ref(),
            &self.config.symbols,
            self.config.output_size,
            &throttle,
        )
        .await;

        let mut summary = IngestSummary::default();

        for fetch in fetched {
            let series = match fetch.result {
                Ok(series) => series,
                Err(e) => {
                    summary.failed_symbols += 1;
                    summary.symbols.push(SymbolOutcome {
                        symbol: fetch.symbol,
                        fetched_days: 0,
                        parsed_points: 0,
                        status: SymbolStatus::FetchFailed(e),
                    });
                    continue;
                }
            };

            let points = parse_series(&fetch.symbol, &series, Utc::now());

            info!("Storing data for {}...", fetch.symbol);
            let status = match self.store.upsert_batch(&points).await {
                Ok(batch) => {
                    info!(
                        "Stored data for {} (stored: {}, skipped: {})",
                        fetch.symbol, batch.stored, batch.skipped
                    );
                    summary.totals += batch;
                    SymbolStatus::Stored(batch)
                }
                Err(e) => {
                    error!("Error storing data for {}: {}", fetch.symbol, e);
                    summary.failed_symbols += 1;
                    SymbolStatus::PersistFailed(e.to_string())
                }
            };

            summary.symbols.push(SymbolOutcome {
                symbol: fetch.symbol,
                fetched_days: series.len(),
                parsed_points: points.len(),
                status,
            });
        }

        info!(
            "Summary: records stored: {}, records skipped: {}, failed symbols: {}",
            summary.totals.stored, summary.totals.skipped, summary.failed_symbols
        );
        summary
    }

    pub async fn report(&self) -> AnalyticsReport {
        build_report(self.store.as_ref(), &self.config.symbols).await
    }

    pub async fn run(&self) -> Result<RunSummary, AppError> {
        info!("Starting financial analytics pipeline");
        let mut phases = PhaseTracker::new();

        phases.advance(PipelinePhase::SettingUp);
        if let Err(e) = self.setup().await {
            phases.advance(PipelinePhase::Aborted);
            error!("Pipeline aborted: {}", e);
            return Err(e);
        }

        phases.advance(PipelinePhase::Ingesting);
        let ingest = self.ingest().await;
        if ingest.failed_symbols > 0 {
            warn!(
                "{} of {} symbols failed during ingestion",
                ingest.failed_symbols,
                self.config.symbols.len()
            );
        }

        phases.advance(PipelinePhase::Reporting);
        let report = self.report().await;

        phases.advance(PipelinePhase::Done);
        info!("Pipeline execution complete");

        Ok(RunSummary {
            ingest,
            report,
            phases: phases.history,
        })
    }
}
