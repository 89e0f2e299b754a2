use crate::domain::decimal::MONEY_DP;
use crate::domain::{AssetClass, Decimal, InvalidSignal, Portfolio, Signal, TradeLevels};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk-based sizing parameters and open limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParams {
    /// Fraction of balance put at risk between entry and stop.
    pub risk_per_trade: Decimal,
    /// Cap on a single position as a fraction of balance.
    pub max_position_pct: Decimal,
    /// Positions below this notional are rejected.
    pub min_notional: Decimal,
    pub max_open_trades: Option<usize>,
    pub max_trades_per_asset: Option<usize>,
    /// Cap on a class's open exposure, as a fraction of balance, including
    /// the position being opened.
    pub cluster_limits: BTreeMap<AssetClass, Decimal>,
    /// Length of the daily balance history.
    pub history_days: usize,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            risk_per_trade: Decimal::new(rust_decimal::Decimal::new(2, 2)),
            max_position_pct: Decimal::new(rust_decimal::Decimal::new(20, 2)),
            min_notional: Decimal::from(100i64),
            max_open_trades: None,
            max_trades_per_asset: None,
            cluster_limits: BTreeMap::new(),
            history_days: 90,
        }
    }
}

/// Confidence 50..=100 maps linearly onto 0.5..=1.0; anything lower floors at 0.5.
pub fn confidence_multiplier(confidence: u8) -> Decimal {
    let conf = Decimal::from(confidence.min(100)) / Decimal::hundred();
    let floor = Decimal::new(rust_decimal::Decimal::new(5, 1));
    conf.max(floor)
}

/// Position notional for a trade, before the minimum-notional check.
///
/// `balance * risk_per_trade / |entry - stop| * entry`, scaled by confidence,
/// capped at `balance * max_position_pct` and at `available_cash`, truncated
/// to cents. Never negative.
pub fn position_size(
    balance: Decimal,
    available_cash: Decimal,
    levels: &TradeLevels,
    confidence: u8,
    params: &SizingParams,
) -> Decimal {
    let risk_per_unit = (levels.entry - levels.stop).abs();
    if risk_per_unit.is_zero() || !balance.is_positive() {
        return Decimal::zero();
    }

    let risk_amount = balance * params.risk_per_trade;
    let base_size = risk_amount / risk_per_unit * levels.entry;
    let scaled = base_size * confidence_multiplier(confidence);

    let cap = balance * params.max_position_pct;
    let size = scaled.min(cap).min(available_cash);
    if size.is_negative() {
        return Decimal::zero();
    }
    size.truncate_dp(MONEY_DP)
}

/// Size `signal` would get against `portfolio`, without opening anything.
pub fn preview_size(portfolio: &Portfolio, signal: &Signal, params: &SizingParams) -> Result<Decimal, InvalidSignal> {
    let levels = signal.levels()?;
    Ok(position_size(
        portfolio.current_balance,
        portfolio.available_cash,
        &levels,
        signal.confidence_pct(),
        params,
    ))
}
