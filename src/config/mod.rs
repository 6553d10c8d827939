//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, DatabaseConfig, DatasetConfig, HistoryConfig, LogFormat, LoggingConfig,
    MetricsConfig, SchedulerConfig, ServerConfig, TrainingConfig,
};
