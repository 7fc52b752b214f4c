use crate::errors::AppError;
use crate::jobs::ingest_job;
use crate::services::pipeline_service::Pipeline;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pipeline: Arc<Pipeline>,
    /// Held for the whole of a run; a tick that finds it taken is skipped.
    pub run_guard: Arc<Mutex<()>>,
}

impl JobContext {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            run_guard: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    pub items_processed: usize,
    pub items_failed: usize,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(pipeline: Arc<Pipeline>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context: JobContext::new(pipeline),
        })
    }

    /// Register the ingestion job on `schedule` (sec min hour day month weekday)
    /// and start ticking.
    pub async fn start(&mut self, schedule: &str) -> Result<(), AppError> {
        info!("Starting job scheduler...");

        self.schedule_job(schedule, "ingest_prices", ingest_job::run_ingest)
            .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;

        info!("Job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("Stopping job scheduler...");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to stop scheduler: {}", e)))?;
        info!("Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("Scheduled: {} [cron: {}]", job_name, schedule);
        Ok(())
    }
}

/// Runs one job invocation, skipping it if the previous one is still going.
pub async fn execute_job_with_tracking<F, Fut>(
    job_name: &str,
    context: JobContext,
    job_fn: Arc<F>,
) -> Option<JobResult>
where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    let guard = context.run_guard.clone();
    let Ok(_running) = guard.try_lock() else {
        warn!("Skipping job {}: previous run still in progress", job_name);
        return None;
    };

    info!("Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );
            Some(job_result)
        }
        Err(e) => {
            error!("Job failed: {} - {} (duration: {}ms)", job_name, e, duration_ms);
            None
        }
    }
}
