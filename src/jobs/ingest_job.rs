use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use tracing::{info, warn};

/// Scheduled entry point for one full pipeline run.
///
/// A setup failure fails the job; per-symbol failures are counted in
/// `items_failed` and the report is still printed.
pub async fn run_ingest(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("Starting price ingestion job");

    let summary = ctx.pipeline.run().await?;

    println!("{}", summary.report.render());

    if summary.ingest.failed_symbols > 0 {
        warn!(
            "Price ingestion finished with {} failed symbols",
            summary.ingest.failed_symbols
        );
    }

    Ok(JobResult {
        items_processed: summary.ingest.totals.stored,
        items_failed: summary.ingest.failed_symbols,
    })
}
