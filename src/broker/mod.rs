//! Broker capability used for bot-mode execution.

use crate::domain::{Action, Asset, Decimal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod paper;

pub use paper::PaperBroker;

/// Narrow order-submission capability of an execution venue.
///
/// Only recommendations routed to a `bot` policy are ever submitted.
#[async_trait]
pub trait Broker: Send + Sync + fmt::Debug {
    /// Policy name this broker serves (e.g. "BYBIT_BTC").
    fn name(&self) -> &str;

    /// Submit a market order for `size` notional.
    async fn submit_order(&self, asset: &Asset, side: Action, size: Decimal) -> Result<OrderConfirmation, BrokerError>;

    /// Net notional currently held for `asset`, if the venue reports it.
    async fn position(&self, asset: &Asset) -> Result<Option<Decimal>, BrokerError>;
}

/// Brokers keyed by policy name.
pub type BrokerSet = BTreeMap<String, Arc<dyn Broker>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub broker: String,
    pub asset: Asset,
    pub side: Action,
    pub size: Decimal,
    pub accepted_at: DateTime<Utc>,
}

/// Error type for broker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Order refused by the venue.
    Rejected(String),
    /// Order failed local validation.
    InvalidOrder(String),
    /// Venue unreachable.
    Unavailable(String),
    /// No broker registered under the routed name.
    NotConfigured(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Rejected(msg) => write!(f, "Order rejected: {}", msg),
            BrokerError::InvalidOrder(msg) => write!(f, "Invalid order: {}", msg),
            BrokerError::Unavailable(msg) => write!(f, "Broker unavailable: {}", msg),
            BrokerError::NotConfigured(name) => write!(f, "No broker configured for {}", name),
        }
    }
}

impl std::error::Error for BrokerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_display() {
        let err = BrokerError::Rejected("insufficient margin".to_string());
        assert_eq!(err.to_string(), "Order rejected: insufficient margin");

        let err = BrokerError::NotConfigured("IG".to_string());
        assert_eq!(err.to_string(), "No broker configured for IG");
    }
}
