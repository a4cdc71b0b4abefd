// Scheduling engine shared by the runner binary and integration tests

pub mod config;
pub mod constraints;
pub mod context;
pub mod cp;
pub mod errors;
pub mod indexes;
pub mod models;
pub mod pool;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod templates;
pub mod time;
