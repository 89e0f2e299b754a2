use crate::domain::decimal::PCT_DP;
use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Thresholds that raise qualitative risk flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Minimum cash as a fraction of balance.
    pub min_cash_buffer: Decimal,
    /// Maximum invested as a fraction of balance.
    pub max_exposure: Decimal,
    /// Maximum drawdown in percent.
    pub max_drawdown_pct: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_cash_buffer: Decimal::new(rust_decimal::Decimal::new(15, 2)),
            max_exposure: Decimal::new(rust_decimal::Decimal::new(90, 2)),
            max_drawdown_pct: Decimal::from(20i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    CashBufferBreach,
    ExposureLimitBreach,
    DrawdownBreach,
}

/// Per-run risk summary. Percentages are in percent (25 means 25%).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub exposure_pct: Decimal,
    pub cash_pct: Decimal,
    pub volatility_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub flags: Vec<RiskFlag>,
    /// Number of balance points the volatility/drawdown figures cover.
    pub history_points: usize,
    /// Volatility of each asset's supplied price series.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_volatility: BTreeMap<String, Decimal>,
}

impl RiskSnapshot {
    pub fn has_flag(&self, flag: RiskFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Period-over-period fractional returns; steps from a zero value are skipped.
pub fn period_returns(series: &[Decimal]) -> Vec<Decimal> {
    series
        .windows(2)
        .filter_map(|w| w[1].checked_div(w[0]).map(|ratio| ratio - Decimal::one()))
        .collect()
}

/// Population standard deviation of period returns, in percent.
pub fn volatility_pct(series: &[Decimal]) -> Decimal {
    let returns = period_returns(series);
    if returns.is_empty() {
        return Decimal::zero();
    }
    let n = Decimal::from(returns.len());
    let mean = returns.iter().sum::<Decimal>() / n;
    let variance = returns
        .iter()
        .map(|r| (*r - mean) * (*r - mean))
        .sum::<Decimal>()
        / n;
    variance.sqrt().unwrap_or_default() * Decimal::hundred()
}

/// Largest peak-to-trough decline over the series, in percent.
pub fn max_drawdown_pct(series: &[Decimal]) -> Decimal {
    let Some(first) = series.first() else {
        return Decimal::zero();
    };
    let mut peak = *first;
    let mut worst = Decimal::zero();
    for value in series {
        if *value > peak {
            peak = *value;
        }
        if let Some(drawdown) = (peak - *value).checked_div(peak) {
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst * Decimal::hundred()
}

/// Computes the per-run risk snapshot. Pure; never fails.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    limits: RiskLimits,
}

impl RiskAssessor {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn evaluate(
        &self,
        balance: Decimal,
        invested: Decimal,
        cash: Decimal,
        balance_history: &[Decimal],
    ) -> RiskSnapshot {
        let (cash_ratio, exposure_ratio) = match (cash.checked_div(balance), invested.checked_div(balance)) {
            (Some(c), Some(e)) => (c, e),
            _ => (Decimal::zero(), Decimal::zero()),
        };
        let volatility = volatility_pct(balance_history);
        let drawdown = max_drawdown_pct(balance_history);

        let mut flags = Vec::new();
        if !balance.is_zero() && cash_ratio < self.limits.min_cash_buffer {
            flags.push(RiskFlag::CashBufferBreach);
        }
        if exposure_ratio > self.limits.max_exposure {
            flags.push(RiskFlag::ExposureLimitBreach);
        }
        if drawdown > self.limits.max_drawdown_pct {
            flags.push(RiskFlag::DrawdownBreach);
        }

        RiskSnapshot {
            exposure_pct: (exposure_ratio * Decimal::hundred()).round_dp(PCT_DP),
            cash_pct: (cash_ratio * Decimal::hundred()).round_dp(PCT_DP),
            volatility_pct: volatility.round_dp(4),
            max_drawdown_pct: drawdown.round_dp(PCT_DP),
            flags,
            history_points: balance_history.len(),
            asset_volatility: BTreeMap::new(),
        }
    }

    /// Volatility of each supplied price series, keyed by asset.
    pub fn asset_volatility(&self, price_history: &BTreeMap<String, Vec<Decimal>>) -> BTreeMap<String, Decimal> {
        price_history
            .iter()
            .filter(|(_, series)| series.len() > 1)
            .map(|(asset, series)| (asset.clone(), volatility_pct(series).round_dp(4)))
            .collect()
    }
}
