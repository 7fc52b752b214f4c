pub mod config;
pub mod db;
pub mod errors;
pub mod external;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;
