//! Routed trade recommendation produced by the executor.

use crate::domain::{Action, Asset, AssetClass, Decimal, ExecutionMode, TradeLevels};
use serde::{Deserialize, Serialize};

/// What produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Driven by an incoming trade signal.
    Signal,
    /// Calendar rebalance.
    RebalanceMonthly,
    /// Deviation-threshold rebalance.
    RebalanceExtraordinary,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Signal => "signal",
            RecommendationKind::RebalanceMonthly => "rebalance_monthly",
            RecommendationKind::RebalanceExtraordinary => "rebalance_extraordinary",
        }
    }

    pub fn is_rebalance(&self) -> bool {
        !matches!(self, RecommendationKind::Signal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecommendation {
    /// Deterministic identifier, see [`TradeRecommendation::compute_key`].
    pub key: String,
    pub asset: Asset,
    pub asset_class: AssetClass,
    pub action: Action,
    pub kind: RecommendationKind,
    /// Suggested notional.
    pub notional: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub broker: String,
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<TradeLevels>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl TradeRecommendation {
    /// Stable key over the fields that identify a recommendation.
    pub fn compute_key(
        asset: &Asset,
        class: &AssetClass,
        action: Action,
        kind: RecommendationKind,
        notional: &Decimal,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(asset.as_str());
        hasher.update(b"|");
        hasher.update(class.as_str());
        hasher.update(b"|");
        hasher.update(action.to_string());
        hasher.update(b"|");
        hasher.update(kind.as_str());
        hasher.update(b"|");
        hasher.update(notional.to_canonical_string());
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    pub fn is_actionable_by_bot(&self) -> bool {
        self.mode == ExecutionMode::Bot && self.kind == RecommendationKind::Signal
    }
}

/// A signal (or rebalance candidate) that did not become a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedSignal {
    /// `None` for a class-level rebalance that found no candidate signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<AssetClass>,
    pub reason: String,
}

impl DroppedSignal {
    pub fn signal(asset: &Asset, asset_class: Option<&AssetClass>, reason: impl Into<String>) -> Self {
        DroppedSignal {
            asset: Some(asset.clone()),
            asset_class: asset_class.cloned(),
            reason: reason.into(),
        }
    }

    pub fn class(asset_class: &AssetClass, reason: impl Into<String>) -> Self {
        DroppedSignal {
            asset: None,
            asset_class: Some(asset_class.clone()),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let asset = Asset::new("BTC");
        let class = AssetClass::new("crypto");
        let notional = Decimal::from(1_000i64);
        let a = TradeRecommendation::compute_key(&asset, &class, Action::Buy, RecommendationKind::Signal, &notional);
        let b = TradeRecommendation::compute_key(&asset, &class, Action::Buy, RecommendationKind::Signal, &notional);
        let c = TradeRecommendation::compute_key(&asset, &class, Action::Sell, RecommendationKind::Signal, &notional);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&RecommendationKind::RebalanceExtraordinary).unwrap();
        assert_eq!(json, "\"rebalance_extraordinary\"");
        assert!(RecommendationKind::RebalanceMonthly.is_rebalance());
    }
}
