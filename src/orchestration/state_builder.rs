use crate::domain::{AssetClass, Decimal, DroppedSignal, Portfolio, TradeRecommendation};
use crate::engine::{AllocationState, RebalanceFlags, RiskFlag, RiskSnapshot, RoutingReport};
use crate::store::{JsonStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the section added to the ledger document in the state output.
pub const DECISION_LAYER_KEY: &str = "decision_layer";

/// Ledger document plus the decision-layer section. The ledger's own
/// top-level keys are emitted unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub decision_layer: DecisionSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSection {
    pub generated_at: DateTime<Utc>,
    pub allocation: AllocationState,
    pub risk: RiskSnapshot,
    pub rebalancing: RebalanceFlags,
    pub routed_trades: Vec<TradeRecommendation>,
    #[serde(default)]
    pub dropped_signals: Vec<DroppedSignal>,
}

/// Lightweight artifact for consumers that only poll for trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalsPayload {
    pub generated_at: DateTime<Utc>,
    pub signals: Vec<TradeRecommendation>,
    pub summary: SignalsSummary,
    pub rebalancing: RebalanceFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalsSummary {
    pub underweight_classes: Vec<AssetClass>,
    pub overweight_classes: Vec<AssetClass>,
    pub exposure_pct: Decimal,
    pub cash_pct: Decimal,
    pub risk_flags: Vec<RiskFlag>,
}

/// Assembles both outputs and writes them atomically.
#[derive(Debug, Clone)]
pub struct StateBuilder {
    state_store: JsonStore,
    signals_store: JsonStore,
}

impl StateBuilder {
    pub fn new(state_store: JsonStore, signals_store: JsonStore) -> Self {
        Self {
            state_store,
            signals_store,
        }
    }

    pub fn build_state(
        &self,
        portfolio: &Portfolio,
        generated_at: DateTime<Utc>,
        allocation: &AllocationState,
        risk: &RiskSnapshot,
        rebalancing: &RebalanceFlags,
        report: &RoutingReport,
    ) -> StatePayload {
        let mut portfolio = portfolio.clone();
        portfolio.extra.remove(DECISION_LAYER_KEY);
        StatePayload {
            portfolio,
            decision_layer: DecisionSection {
                generated_at,
                allocation: allocation.clone(),
                risk: risk.clone(),
                rebalancing: rebalancing.clone(),
                routed_trades: report.recommendations.clone(),
                dropped_signals: report.dropped.clone(),
            },
        }
    }

    pub fn build_signals(
        &self,
        generated_at: DateTime<Utc>,
        allocation: &AllocationState,
        risk: &RiskSnapshot,
        rebalancing: &RebalanceFlags,
        report: &RoutingReport,
        threshold_pp: Decimal,
    ) -> SignalsPayload {
        SignalsPayload {
            generated_at,
            signals: report.recommendations.clone(),
            summary: SignalsSummary {
                underweight_classes: allocation.underweight(threshold_pp),
                overweight_classes: allocation.overweight(threshold_pp),
                exposure_pct: risk.exposure_pct,
                cash_pct: risk.cash_pct,
                risk_flags: risk.flags.clone(),
            },
            rebalancing: rebalancing.clone(),
        }
    }

    /// Re-emit `state` over the current ledger, keeping its decision section,
    /// and rewrite the state file only.
    pub fn refresh_state(&self, state: &StatePayload, portfolio: &Portfolio) -> Result<StatePayload, StoreError> {
        let mut portfolio = portfolio.clone();
        portfolio.extra.remove(DECISION_LAYER_KEY);
        let refreshed = StatePayload {
            portfolio,
            decision_layer: state.decision_layer.clone(),
        };
        self.state_store.save(&refreshed)?;
        Ok(refreshed)
    }

    /// Write the state file, then the signals file.
    pub fn write(&self, state: &StatePayload, signals: &SignalsPayload) -> Result<(), StoreError> {
        self.state_store.save(state)?;
        self.signals_store.save(signals)
    }
}
