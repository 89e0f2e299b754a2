use super::state_builder::{SignalsPayload, StateBuilder, StatePayload};
use super::DecisionError;
use crate::config::PortfolioConfig;
use crate::domain::{MarketSnapshot, Portfolio, Signal};
use crate::engine::{Allocator, PortfolioExecutor, RebalanceFlags, RiskAssessor, RiskSnapshot};
use crate::feeds::{PriceHistory, EQUITY_CURVE_KEY};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

/// Both payloads produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutputs {
    pub state: StatePayload,
    pub signals: SignalsPayload,
}

/// Allocator, risk assessor, executor and state builder wired to one
/// portfolio configuration.
#[derive(Debug, Clone)]
pub struct DecisionLayer {
    config: PortfolioConfig,
    allocator: Allocator,
    assessor: RiskAssessor,
    executor: PortfolioExecutor,
    builder: StateBuilder,
}

impl DecisionLayer {
    pub fn new(config: PortfolioConfig, builder: StateBuilder) -> Self {
        let allocator = Allocator::new(config.target_allocations.clone());
        let assessor = RiskAssessor::new(config.risk.clone());
        let executor = PortfolioExecutor::new(
            config.brokers.clone(),
            config.asset_classes.clone(),
            config.trade_thresholds.clone(),
            config.sizing.clone(),
            config.rebalance.threshold_pp(),
        );
        Self {
            config,
            allocator,
            assessor,
            executor,
            builder,
        }
    }

    /// Read `portfolio_config.json` (defaults when absent or malformed).
    pub fn from_config_file(path: &Path, builder: StateBuilder) -> Self {
        Self::new(PortfolioConfig::load(path), builder)
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn run(
        &self,
        portfolio: &Portfolio,
        signals: &[Signal],
        market: &MarketSnapshot,
        price_history: &PriceHistory,
    ) -> Result<DecisionOutputs, DecisionError> {
        self.run_at(portfolio, signals, market, price_history, Utc::now())
    }

    /// One decision pass: allocation, risk, routing, then both writes.
    /// The only side effects are the two output files.
    pub fn run_at(
        &self,
        portfolio: &Portfolio,
        signals: &[Signal],
        market: &MarketSnapshot,
        price_history: &PriceHistory,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutputs, DecisionError> {
        let allocation = self
            .allocator
            .compute_allocation(portfolio, &self.config.asset_classes);
        let flags = RebalanceFlags::evaluate(&allocation, &self.config.rebalance, now.date_naive());

        let risk = self.assess(portfolio, price_history);
        if !risk.flags.is_empty() {
            warn!(flags = ?risk.flags, exposure_pct = %risk.exposure_pct, cash_pct = %risk.cash_pct, "risk limits breached");
        }

        let report = self
            .executor
            .generate_recommendations(signals, &allocation, portfolio, &flags, market);

        let state = self
            .builder
            .build_state(portfolio, now, &allocation, &risk, &flags, &report);
        let signals_payload = self.builder.build_signals(
            now,
            &allocation,
            &risk,
            &flags,
            &report,
            self.config.rebalance.threshold_pp(),
        );
        self.builder.write(&state, &signals_payload)?;

        info!(
            signals_in = signals.len(),
            routed = report.recommendations.len(),
            dropped = report.dropped.len(),
            monthly_due = flags.monthly_due,
            extraordinary_due = flags.extraordinary_due,
            balance = %portfolio.current_balance,
            "decision run complete"
        );
        Ok(DecisionOutputs {
            state,
            signals: signals_payload,
        })
    }

    /// Bring the state output in line with a ledger that changed after the
    /// run, such as positions opened by dispatch.
    pub fn refresh_state(&self, outputs: &mut DecisionOutputs, portfolio: &Portfolio) -> Result<(), DecisionError> {
        outputs.state = self.builder.refresh_state(&outputs.state, portfolio)?;
        debug!(active_positions = portfolio.active_positions.len(), "state refreshed");
        Ok(())
    }

    fn assess(&self, portfolio: &Portfolio, price_history: &PriceHistory) -> RiskSnapshot {
        let series = match price_history.get(EQUITY_CURVE_KEY) {
            Some(curve) if !curve.is_empty() => curve.clone(),
            _ => portfolio.balance_series(),
        };
        let mut risk = self.assessor.evaluate(
            portfolio.current_balance,
            portfolio.total_invested,
            portfolio.available_cash,
            &series,
        );
        let assets: PriceHistory = price_history
            .iter()
            .filter(|(key, _)| key.as_str() != EQUITY_CURVE_KEY)
            .map(|(key, series)| (key.clone(), series.clone()))
            .collect();
        risk.asset_volatility = self.assessor.asset_volatility(&assets);
        risk
    }
}
