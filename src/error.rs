use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::feeds::FeedError;
use crate::orchestration::DecisionError;
use crate::store::StoreError;
use thiserror::Error;

/// Top-level error for the host process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("Decision run failed: {0}")]
    Decision(#[from] DecisionError),
}
