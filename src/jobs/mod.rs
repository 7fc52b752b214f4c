//! Jobs registered with the scheduler when `INGEST_CRON` is set.
//!
//! - `ingest_job` - runs the full pipeline and prints the report

pub mod ingest_job;
