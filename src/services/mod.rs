pub mod fetch_service;
pub mod job_scheduler_service;
pub mod parser;
pub mod pipeline_service;
pub mod report_service;
pub mod throttle;
