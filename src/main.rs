use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use price_ingest::config::AppConfig;
use price_ingest::external::alphavantage::AlphaVantageProvider;
use price_ingest::logging::{init_logging, LoggingConfig};
use price_ingest::services::job_scheduler_service::JobSchedulerService;
use price_ingest::services::pipeline_service::Pipeline;
use price_ingest::store::PgPriceStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    if let Err(e) = init_logging(LoggingConfig::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let store = PgPriceStore::connect_lazy(&config.database)
        .context("Failed to create database pool")?;
    let provider = AlphaVantageProvider::new(&config.provider);

    let pipeline = Arc::new(Pipeline::new(
        config.pipeline.clone(),
        Arc::new(provider),
        Arc::new(store),
    ));

    match config.schedule.as_deref() {
        Some(schedule) => {
            let mut scheduler = JobSchedulerService::new(pipeline).await?;
            scheduler.start(schedule).await?;

            info!("Waiting for shutdown signal");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;

            scheduler.stop().await?;
            Ok(ExitCode::SUCCESS)
        }
        None => match pipeline.run().await {
            Ok(summary) => {
                println!("{}", summary.report.render());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
