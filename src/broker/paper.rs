//! In-memory broker that accepts orders without touching a venue.

use super::{Broker, BrokerError, OrderConfirmation};
use crate::domain::{Action, Asset, Decimal};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug)]
pub struct PaperBroker {
    name: String,
    rejected: BTreeSet<Asset>,
    unavailable: bool,
    orders: Mutex<Vec<OrderConfirmation>>,
    positions: Mutex<BTreeMap<Asset, Decimal>>,
}

impl PaperBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rejected: BTreeSet::new(),
            unavailable: false,
            orders: Mutex::new(Vec::new()),
            positions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Refuse every order for `asset`.
    pub fn with_rejected_asset(mut self, asset: &str) -> Self {
        self.rejected.insert(Asset::new(asset));
        self
    }

    /// Fail every call as if the venue were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Orders accepted so far, in submission order.
    pub fn orders(&self) -> Vec<OrderConfirmation> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit_order(&self, asset: &Asset, side: Action, size: Decimal) -> Result<OrderConfirmation, BrokerError> {
        if self.unavailable {
            return Err(BrokerError::Unavailable(self.name.clone()));
        }
        if !size.is_positive() {
            return Err(BrokerError::InvalidOrder(format!("size must be positive, got {}", size)));
        }
        if self.rejected.contains(asset) {
            return Err(BrokerError::Rejected(format!("{} not tradable on {}", asset, self.name)));
        }

        let confirmation = OrderConfirmation {
            order_id: Uuid::new_v4().to_string(),
            broker: self.name.clone(),
            asset: asset.clone(),
            side,
            size,
            accepted_at: Utc::now(),
        };

        let signed = match side {
            Action::Buy => size,
            Action::Sell => -size,
        };
        if let Ok(mut positions) = self.positions.lock() {
            *positions.entry(asset.clone()).or_default() += signed;
        }
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(confirmation.clone());
        }
        info!(broker = %self.name, asset = %asset, side = %side, size = %size, order_id = %confirmation.order_id, "paper order accepted");
        Ok(confirmation)
    }

    async fn position(&self, asset: &Asset) -> Result<Option<Decimal>, BrokerError> {
        if self.unavailable {
            return Err(BrokerError::Unavailable(self.name.clone()));
        }
        Ok(self.positions.lock().ok().and_then(|p| p.get(asset).copied()))
    }
}
