pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use config::AppConfig;
pub use error::{SchedulerError, SchedulerResult};
