//! Infrastructure layer - stage implementations, scheduling and observability

pub mod extraction;
pub mod formatting;
pub mod history;
pub mod logging;
pub mod metrics_store;
pub mod observability;
pub mod persistence;
pub mod records;
pub mod retrain;
pub mod scheduler;
pub mod search;
