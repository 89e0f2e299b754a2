//! Domain primitives: Asset, AssetClass, Direction, Action.

use serde::{Deserialize, Serialize};

/// Asset symbol (e.g., "BTC", "SPX").
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Asset(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset class bucket used for allocation (e.g., "crypto", "indices").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetClass(pub String);

impl AssetClass {
    /// Bucket holding uninvested cash.
    pub const CASH: &'static str = "cash";
    /// Bucket for assets missing from the asset-class map.
    pub const OTHER: &'static str = "other";

    pub fn new(name: impl Into<String>) -> Self {
        AssetClass(name.into())
    }

    pub fn cash() -> Self {
        AssetClass(Self::CASH.to_string())
    }

    pub fn other() -> Self {
        AssetClass(Self::OTHER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cash(&self) -> bool {
        self.0 == Self::CASH
    }

    pub fn is_other(&self) -> bool {
        self.0 == Self::OTHER
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// Signed multiplier for P&L (+1 for Long, -1 for Short).
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    /// Order side that opens a position in this direction.
    pub fn opening_action(&self) -> Action {
        match self {
            Direction::Long => Action::Buy,
            Direction::Short => Action::Sell,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Trade action / order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Long.sign(), 1);
        assert_eq!(Direction::Short.sign(), -1);
    }

    #[test]
    fn test_direction_serialization() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        let short: Direction = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(short, Direction::Short);
    }

    #[test]
    fn test_opening_action() {
        assert_eq!(Direction::Long.opening_action(), Action::Buy);
        assert_eq!(Direction::Short.opening_action(), Action::Sell);
        assert_eq!(Action::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_asset_class_buckets() {
        assert!(AssetClass::cash().is_cash());
        assert!(AssetClass::other().is_other());
        assert!(!AssetClass::new("crypto").is_other());
    }

    #[test]
    fn test_asset_empty() {
        assert!(Asset::new("  ").is_empty());
        assert_eq!(Asset::new("BTC").to_string(), "BTC");
    }
}
