use crate::domain::{AssetClass, Decimal, RecommendationKind};
use crate::engine::allocator::AllocationState;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// When the portfolio is due for rebalancing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalancePolicy {
    /// Day of month on which a calendar rebalance is due.
    pub monthly_day: u32,
    /// Allocation drift, as a fraction, that forces a rebalance.
    pub deviation_threshold: Decimal,
    /// Calendar rebalance every N months, counted from January.
    pub cycle_months: u32,
}

impl Default for RebalancePolicy {
    fn default() -> Self {
        Self {
            monthly_day: 1,
            deviation_threshold: Decimal::new(rust_decimal::Decimal::new(10, 2)),
            cycle_months: 1,
        }
    }
}

impl RebalancePolicy {
    /// Deviation threshold expressed in percentage points.
    pub fn threshold_pp(&self) -> Decimal {
        self.deviation_threshold * Decimal::hundred()
    }

    pub fn is_calendar_day(&self, today: NaiveDate) -> bool {
        let cycle = self.cycle_months.max(1);
        today.day() == self.monthly_day && today.month0() % cycle == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RebalanceFlags {
    pub monthly_due: bool,
    pub extraordinary_due: bool,
    /// Scored classes whose drift reached the threshold.
    #[serde(default)]
    pub breached_classes: Vec<AssetClass>,
}

impl RebalanceFlags {
    pub fn evaluate(allocation: &AllocationState, policy: &RebalancePolicy, today: NaiveDate) -> Self {
        let breached_classes = allocation.breaching(policy.threshold_pp());
        RebalanceFlags {
            monthly_due: policy.is_calendar_day(today),
            extraordinary_due: !breached_classes.is_empty(),
            breached_classes,
        }
    }

    pub fn any_due(&self) -> bool {
        self.monthly_due || self.extraordinary_due
    }

    /// Tag for rebalance-driven recommendations; the calendar wins when both are due.
    pub fn kind(&self) -> Option<RecommendationKind> {
        if self.monthly_due {
            Some(RecommendationKind::RebalanceMonthly)
        } else if self.extraordinary_due {
            Some(RecommendationKind::RebalanceExtraordinary)
        } else {
            None
        }
    }
}
