//! Broker routing policy table.

use crate::domain::AssetClass;
use serde::{Deserialize, Serialize};

/// How recommendations routed to a broker are acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Automatically actionable through the broker capability.
    Bot,
    /// Informational only, for a human to act on.
    Notify,
}

/// One row of the static broker policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPolicy {
    pub broker: String,
    pub mode: ExecutionMode,
    pub asset_classes: Vec<AssetClass>,
    #[serde(default)]
    pub notes: String,
}

impl BrokerPolicy {
    pub fn new(broker: &str, mode: ExecutionMode, classes: &[&str], notes: &str) -> Self {
        BrokerPolicy {
            broker: broker.to_string(),
            mode,
            asset_classes: classes.iter().map(|c| AssetClass::new(*c)).collect(),
            notes: notes.to_string(),
        }
    }

    pub fn allows(&self, class: &AssetClass) -> bool {
        self.asset_classes.contains(class)
    }
}

/// Default table. Order matters: the first policy allowing a class wins.
pub fn default_broker_policies() -> Vec<BrokerPolicy> {
    vec![
        BrokerPolicy::new(
            "BYBIT_BTC",
            ExecutionMode::Bot,
            &["crypto"],
            "inverse futures, BTC collateral",
        ),
        BrokerPolicy::new(
            "IG",
            ExecutionMode::Bot,
            &["indices", "fx", "commodities"],
            "CFD bot trading",
        ),
        BrokerPolicy::new(
            "DIRECTA",
            ExecutionMode::Notify,
            &["equity", "bonds"],
            "long-term equity, discretionary only",
        ),
        BrokerPolicy::new(
            "TRADE_REPUBLIC",
            ExecutionMode::Notify,
            &["etf"],
            "savings plans, discretionary only",
        ),
    ]
}

/// First policy in table order allowing `class`.
pub fn resolve_policy<'a>(policies: &'a [BrokerPolicy], class: &AssetClass) -> Option<&'a BrokerPolicy> {
    policies.iter().find(|p| p.allows(class))
}
