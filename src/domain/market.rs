//! Market data snapshot supplied by the caller.

use crate::domain::{Asset, Decimal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest quote for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    #[serde(default)]
    pub change_pct: Option<Decimal>,
}

impl Quote {
    pub fn new(price: Decimal) -> Self {
        Quote {
            price,
            change_pct: None,
        }
    }
}

/// `{asset: {price, change_pct}}`.
pub type MarketSnapshot = BTreeMap<Asset, Quote>;

/// Usable price for `asset`, ignoring missing or non-positive quotes.
pub fn live_price(snapshot: &MarketSnapshot, asset: &Asset) -> Option<Decimal> {
    snapshot
        .get(asset)
        .map(|q| q.price)
        .filter(|p| p.is_positive())
}
