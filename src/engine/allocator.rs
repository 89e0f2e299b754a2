use crate::domain::{Asset, AssetClass, Decimal, Portfolio};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exposure and deviation for one asset-class bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAllocation {
    /// Σ open position sizes in the class (available cash for `cash`).
    pub exposure_value: Decimal,
    /// Target as a fraction of equity; `None` for unscored buckets.
    pub target_weight: Option<Decimal>,
    /// Actual fraction of equity.
    pub actual_weight: Decimal,
    /// `actual - target` in percentage points.
    pub difference_pct: Option<Decimal>,
    /// `target * equity - exposure`; positive means room to buy.
    pub difference_value: Option<Decimal>,
}

impl ClassAllocation {
    pub fn is_scored(&self) -> bool {
        self.target_weight.is_some()
    }
}

/// Actual versus target weights, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationState {
    pub total_equity: Decimal,
    pub classes: BTreeMap<AssetClass, ClassAllocation>,
}

impl AllocationState {
    pub fn class(&self, class: &AssetClass) -> Option<&ClassAllocation> {
        self.classes.get(class)
    }

    /// Σ actual weights over every bucket.
    pub fn weight_sum(&self) -> Decimal {
        self.classes.values().map(|c| c.actual_weight).sum()
    }

    /// Scored classes whose |deviation| is at least `threshold_pp`.
    pub fn breaching(&self, threshold_pp: Decimal) -> Vec<AssetClass> {
        self.classes
            .iter()
            .filter(|(_, c)| c.difference_pct.is_some_and(|pp| pp.abs() >= threshold_pp))
            .map(|(class, _)| class.clone())
            .collect()
    }

    /// Scored classes below target by at least `threshold_pp`.
    pub fn underweight(&self, threshold_pp: Decimal) -> Vec<AssetClass> {
        self.classes
            .iter()
            .filter(|(_, c)| c.difference_pct.is_some_and(|pp| -pp >= threshold_pp))
            .map(|(class, _)| class.clone())
            .collect()
    }

    /// Scored classes above target by at least `threshold_pp`.
    pub fn overweight(&self, threshold_pp: Decimal) -> Vec<AssetClass> {
        self.classes
            .iter()
            .filter(|(_, c)| c.difference_pct.is_some_and(|pp| pp >= threshold_pp))
            .map(|(class, _)| class.clone())
            .collect()
    }
}

/// Buckets exposure by asset class against target weights.
#[derive(Debug, Clone)]
pub struct Allocator {
    targets: BTreeMap<AssetClass, Decimal>,
}

impl Allocator {
    pub fn new(targets: BTreeMap<AssetClass, Decimal>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &BTreeMap<AssetClass, Decimal> {
        &self.targets
    }

    /// Compute actual weights and per-class deviation.
    ///
    /// Assets absent from `asset_classes` land in `other`. `other` and any
    /// class without a target weight are tracked but not scored. With zero
    /// equity every weight and deviation is reported as zero.
    pub fn compute_allocation(
        &self,
        portfolio: &Portfolio,
        asset_classes: &BTreeMap<Asset, AssetClass>,
    ) -> AllocationState {
        let mut exposures: BTreeMap<AssetClass, Decimal> = self
            .targets
            .keys()
            .map(|class| (class.clone(), Decimal::zero()))
            .collect();
        exposures.entry(AssetClass::other()).or_default();

        for position in &portfolio.active_positions {
            let class = asset_classes
                .get(&position.asset)
                .cloned()
                .unwrap_or_else(AssetClass::other);
            *exposures.entry(class).or_default() += position.position_size;
        }
        exposures.insert(AssetClass::cash(), portfolio.available_cash);

        let total_equity: Decimal = exposures.values().sum();

        let classes = exposures
            .into_iter()
            .map(|(class, exposure_value)| {
                let target = if class.is_other() {
                    None
                } else {
                    self.targets.get(&class).copied()
                };
                let allocation = if total_equity.is_zero() {
                    ClassAllocation {
                        exposure_value,
                        target_weight: target,
                        actual_weight: Decimal::zero(),
                        difference_pct: target.map(|_| Decimal::zero()),
                        difference_value: target.map(|_| Decimal::zero()),
                    }
                } else {
                    let actual_weight = exposure_value / total_equity;
                    ClassAllocation {
                        exposure_value,
                        target_weight: target,
                        actual_weight,
                        difference_pct: target.map(|t| (actual_weight - t) * Decimal::hundred()),
                        difference_value: target.map(|t| (t * total_equity - exposure_value).money()),
                    }
                };
                (class, allocation)
            })
            .collect();

        AllocationState {
            total_equity,
            classes,
        }
    }
}
