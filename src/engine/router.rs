use crate::domain::decimal::MONEY_DP;
use crate::domain::{
    live_price, resolve_policy, Action, Asset, AssetClass, BrokerPolicy, Decimal, DroppedSignal, MarketSnapshot,
    Portfolio, RecommendationKind, Signal, TradeLevels, TradeRecommendation,
};
use crate::engine::allocator::AllocationState;
use crate::engine::rebalance::RebalanceFlags;
use crate::engine::sizing::{preview_size, SizingParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Gates a signal must pass before it is routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeThresholds {
    pub min_score: f64,
    pub min_notional: Decimal,
}

impl Default for TradeThresholds {
    fn default() -> Self {
        Self {
            min_score: 0.6,
            min_notional: Decimal::from(100i64),
        }
    }
}

/// Output of one routing pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingReport {
    pub recommendations: Vec<TradeRecommendation>,
    pub dropped: Vec<DroppedSignal>,
}

impl RoutingReport {
    fn drop_signal(&mut self, asset: &Asset, class: Option<&AssetClass>, reason: String) {
        debug!(asset = %asset, reason = %reason, "signal dropped");
        self.dropped.push(DroppedSignal::signal(asset, class, reason));
    }

    fn drop_class(&mut self, class: &AssetClass, reason: String) {
        debug!(asset_class = %class, reason = %reason, "rebalance skipped");
        self.dropped.push(DroppedSignal::class(class, reason));
    }
}

/// Turns signals plus allocation drift into routed recommendations.
#[derive(Debug, Clone)]
pub struct PortfolioExecutor {
    policies: Vec<BrokerPolicy>,
    asset_classes: BTreeMap<Asset, AssetClass>,
    thresholds: TradeThresholds,
    sizing: SizingParams,
    /// Deviation threshold in percentage points.
    threshold_pp: Decimal,
}

impl PortfolioExecutor {
    pub fn new(
        policies: Vec<BrokerPolicy>,
        asset_classes: BTreeMap<Asset, AssetClass>,
        thresholds: TradeThresholds,
        sizing: SizingParams,
        threshold_pp: Decimal,
    ) -> Self {
        Self {
            policies,
            asset_classes,
            thresholds,
            sizing,
            threshold_pp,
        }
    }

    pub fn class_of(&self, asset: &Asset) -> AssetClass {
        self.asset_classes
            .get(asset)
            .cloned()
            .unwrap_or_else(AssetClass::other)
    }

    /// Route every signal, then add rebalance trades when a rebalance is due.
    ///
    /// Nothing here fails: a signal that cannot be routed ends up in
    /// `dropped` with the reason.
    pub fn generate_recommendations(
        &self,
        signals: &[Signal],
        allocation: &AllocationState,
        portfolio: &Portfolio,
        flags: &RebalanceFlags,
        market: &MarketSnapshot,
    ) -> RoutingReport {
        let mut report = RoutingReport::default();

        for signal in signals {
            self.route_signal(signal, allocation, portfolio, market, &mut report);
        }

        if let Some(kind) = flags.kind() {
            self.rebalance(signals, allocation, portfolio, flags, kind, market, &mut report);
        }

        info!(
            routed = report.recommendations.len(),
            dropped = report.dropped.len(),
            monthly_due = flags.monthly_due,
            extraordinary_due = flags.extraordinary_due,
            "routing complete"
        );
        report
    }

    fn route_signal(
        &self,
        signal: &Signal,
        allocation: &AllocationState,
        portfolio: &Portfolio,
        market: &MarketSnapshot,
        report: &mut RoutingReport,
    ) {
        let asset = &signal.asset;
        let score = match signal.combined_score() {
            Some(score) if score >= self.thresholds.min_score => score,
            Some(score) => {
                report.drop_signal(
                    asset,
                    None,
                    format!("score {:.2} below minimum {:.2}", score, self.thresholds.min_score),
                );
                return;
            }
            None => {
                report.drop_signal(asset, None, "no score supplied".to_string());
                return;
            }
        };

        let levels = match signal.levels() {
            Ok(levels) => levels,
            Err(e) => {
                report.drop_signal(asset, None, format!("invalid signal: {}", e));
                return;
            }
        };

        let raw = match preview_size(portfolio, signal, &self.sizing) {
            Ok(size) => size,
            Err(e) => {
                report.drop_signal(asset, None, format!("invalid signal: {}", e));
                return;
            }
        };
        if raw < self.thresholds.min_notional {
            report.drop_signal(
                asset,
                None,
                format!("implied notional {} below minimum {}", raw, self.thresholds.min_notional),
            );
            return;
        }

        let class = self.class_of(asset);
        let Some(policy) = resolve_policy(&self.policies, &class) else {
            report.drop_signal(asset, Some(&class), format!("no broker policy for class {}", class));
            return;
        };

        let mut notes = vec![format!("score {:.2}", score)];
        let notional = self.rebalance_aware_size(raw, &class, allocation, portfolio, &mut notes);
        if notional < self.thresholds.min_notional {
            report.drop_signal(
                asset,
                Some(&class),
                format!("suggested notional {} below minimum after allocation bias", notional),
            );
            return;
        }

        if !signal.has_ordered_levels(&levels) {
            notes.push("levels not in target/entry/stop order".to_string());
        }
        if !policy.notes.is_empty() {
            notes.push(policy.notes.clone());
        }

        let action = signal.direction.opening_action();
        let kind = RecommendationKind::Signal;
        report.recommendations.push(TradeRecommendation {
            key: TradeRecommendation::compute_key(asset, &class, action, kind, &notional),
            asset: asset.clone(),
            asset_class: class,
            action,
            kind,
            notional,
            units: units_for(notional, asset, &levels, market),
            confidence: Some(signal.confidence_pct()),
            score: Some(score),
            broker: policy.broker.clone(),
            mode: policy.mode,
            levels: Some(levels),
            notes,
        });
    }

    /// Overweight classes shrink linearly to nothing at the threshold;
    /// underweight classes are sized to the rebalancing gap, bounded by cash
    /// and the per-position cap.
    fn rebalance_aware_size(
        &self,
        raw: Decimal,
        class: &AssetClass,
        allocation: &AllocationState,
        portfolio: &Portfolio,
        notes: &mut Vec<String>,
    ) -> Decimal {
        let Some(bucket) = allocation.class(class).filter(|c| c.is_scored()) else {
            return raw;
        };
        let (Some(pp), Some(gap)) = (bucket.difference_pct, bucket.difference_value) else {
            return raw;
        };

        if pp.is_positive() {
            let factor = match pp.checked_div(self.threshold_pp) {
                Some(ratio) => (Decimal::one() - ratio).max(Decimal::zero()),
                None => Decimal::zero(),
            };
            notes.push(format!("{} overweight by {}pp", class, pp.round_dp(2)));
            (raw * factor).truncate_dp(MONEY_DP)
        } else if gap.is_positive() {
            notes.push(format!("{} underweight by {}pp, sized to rebalancing gap", class, pp.abs().round_dp(2)));
            let cap = portfolio.current_balance * self.sizing.max_position_pct;
            gap.min(portfolio.available_cash).min(cap).truncate_dp(MONEY_DP)
        } else {
            raw
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rebalance(
        &self,
        signals: &[Signal],
        allocation: &AllocationState,
        portfolio: &Portfolio,
        flags: &RebalanceFlags,
        kind: RecommendationKind,
        market: &MarketSnapshot,
        report: &mut RoutingReport,
    ) {
        for class in allocation.breaching(self.threshold_pp) {
            if class.is_cash() {
                continue;
            }
            let Some(bucket) = allocation.class(&class) else {
                continue;
            };
            let Some(gap) = bucket.difference_value else {
                continue;
            };

            let (action, notional) = if gap.is_positive() {
                (Action::Buy, gap.min(portfolio.available_cash))
            } else {
                (Action::Sell, gap.abs().min(bucket.exposure_value))
            };
            let notional = notional.truncate_dp(MONEY_DP);
            if notional < self.thresholds.min_notional {
                report.drop_class(&class, format!("rebalance amount {} below minimum", notional));
                continue;
            }

            let Some(policy) = resolve_policy(&self.policies, &class) else {
                report.drop_class(&class, format!("no broker policy for class {}", class));
                continue;
            };

            let Some((candidate, score)) = self.best_candidate(signals, &class) else {
                report.drop_class(&class, format!("{} due but no qualifying signal in class", kind.as_str()));
                continue;
            };

            let levels = candidate.levels().ok();
            let mut notes = vec![format!(
                "{} drift {}pp vs threshold {}pp",
                class,
                bucket.difference_pct.unwrap_or_default().round_dp(2),
                self.threshold_pp.round_dp(2)
            )];
            if flags.monthly_due {
                notes.push("calendar rebalance".to_string());
            }
            if !policy.notes.is_empty() {
                notes.push(policy.notes.clone());
            }

            let asset = candidate.asset.clone();
            report.recommendations.push(TradeRecommendation {
                key: TradeRecommendation::compute_key(&asset, &class, action, kind, &notional),
                units: levels.as_ref().and_then(|lv| units_for(notional, &asset, lv, market)),
                asset,
                asset_class: class,
                action,
                kind,
                notional,
                confidence: Some(candidate.confidence_pct()),
                score: Some(score),
                broker: policy.broker.clone(),
                mode: policy.mode,
                levels,
                notes,
            });
        }
    }

    /// Highest-scoring signal in `class` that clears `min_score`; first wins on ties.
    fn best_candidate<'a>(&self, signals: &'a [Signal], class: &AssetClass) -> Option<(&'a Signal, f64)> {
        let mut best: Option<(&Signal, f64)> = None;
        for signal in signals {
            if &self.class_of(&signal.asset) != class {
                continue;
            }
            let Some(score) = signal.combined_score() else {
                continue;
            };
            if score < self.thresholds.min_score {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((signal, score));
            }
        }
        best
    }
}

fn units_for(notional: Decimal, asset: &Asset, levels: &TradeLevels, market: &MarketSnapshot) -> Option<Decimal> {
    let price = live_price(market, asset).unwrap_or(levels.entry);
    notional.checked_div(price).map(|u| u.units())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_broker_policies, Direction, ExecutionMode};
    use crate::engine::allocator::ClassAllocation;
    use chrono::Utc;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn class_map() -> BTreeMap<Asset, AssetClass> {
        [("BTC", "crypto"), ("ETH", "crypto"), ("SPX", "indices"), ("AAPL", "equity")]
            .into_iter()
            .map(|(a, c)| (Asset::new(a), AssetClass::new(c)))
            .collect()
    }

    fn executor() -> PortfolioExecutor {
        PortfolioExecutor::new(
            default_broker_policies(),
            class_map(),
            TradeThresholds::default(),
            SizingParams::default(),
            d("10"),
        )
    }

    fn bucket(exposure: &str, target: &str, actual: &str, pp: &str, gap: &str) -> ClassAllocation {
        ClassAllocation {
            exposure_value: d(exposure),
            target_weight: Some(d(target)),
            actual_weight: d(actual),
            difference_pct: Some(d(pp)),
            difference_value: Some(d(gap)),
        }
    }

    fn balanced() -> AllocationState {
        let mut classes = BTreeMap::new();
        classes.insert(AssetClass::new("crypto"), bucket("2000", "0.2", "0.2", "0", "0"));
        classes.insert(AssetClass::new("indices"), bucket("4000", "0.4", "0.4", "0", "0"));
        AllocationState {
            total_equity: d("10000"),
            classes,
        }
    }

    fn portfolio() -> Portfolio {
        Portfolio::new(d("10000"), Utc::now())
    }

    fn btc(score: f64) -> Signal {
        Signal::new("BTC", Direction::Long, d("100"), d("120"), d("90"))
            .with_confidence(60.0)
            .with_score(score)
    }

    #[test]
    fn test_low_score_is_dropped() {
        let report = executor().generate_recommendations(
            &[btc(0.4)],
            &balanced(),
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert!(report.dropped[0].reason.contains("below minimum"));
    }

    #[test]
    fn test_missing_score_is_dropped() {
        let signal = Signal::new("BTC", Direction::Long, d("100"), d("120"), d("90"));
        let report = executor().generate_recommendations(
            &[signal],
            &balanced(),
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.dropped[0].reason, "no score supplied");
    }

    #[test]
    fn test_routed_to_first_matching_policy() {
        let report = executor().generate_recommendations(
            &[btc(0.8)],
            &balanced(),
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert_eq!(report.recommendations.len(), 1);
        let rec = &report.recommendations[0];
        assert_eq!(rec.broker, "BYBIT_BTC");
        assert_eq!(rec.mode, ExecutionMode::Bot);
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(rec.kind, RecommendationKind::Signal);
        // 200 risk / 10 per unit * 100 * 0.6 = 1200
        assert_eq!(rec.notional, d("1200"));
        assert_eq!(rec.units, Some(d("12")));
        assert!(rec.is_actionable_by_bot());
    }

    #[test]
    fn test_unrouted_class_is_dropped_not_errored() {
        let signal = Signal::new("XYZ", Direction::Long, d("100"), d("120"), d("90")).with_score(0.9);
        let report = executor().generate_recommendations(
            &[signal],
            &balanced(),
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.dropped[0].asset_class, Some(AssetClass::other()));
    }

    #[test]
    fn test_overweight_class_shrinks_size() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("crypto"), bucket("2500", "0.2", "0.25", "5", "-500"));
        let report = executor().generate_recommendations(
            &[btc(0.8)],
            &allocation,
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert_eq!(report.recommendations[0].notional, d("600"));
    }

    #[test]
    fn test_overweight_past_threshold_routes_nothing() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("crypto"), bucket("3800", "0.2", "0.38", "18", "-1800"));
        let report = executor().generate_recommendations(
            &[btc(0.8)],
            &allocation,
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_underweight_class_sized_to_gap() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("crypto"), bucket("500", "0.2", "0.05", "-15", "1500"));
        let report = executor().generate_recommendations(
            &[btc(0.8)],
            &allocation,
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        assert_eq!(report.recommendations[0].notional, d("1500"));
    }

    #[test]
    fn test_underweight_gap_bounded_by_position_cap() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("crypto"), bucket("0", "0.6", "0", "-60", "6000"));
        let report = executor().generate_recommendations(
            &[btc(0.8)],
            &allocation,
            &portfolio(),
            &RebalanceFlags::default(),
            &MarketSnapshot::new(),
        );
        // 20% of a 10000 balance.
        assert_eq!(report.recommendations[0].notional, d("2000"));
    }

    #[test]
    fn test_extraordinary_rebalance_sells_overweight_class() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("crypto"), bucket("3800", "0.2", "0.38", "18", "-1800"));
        let flags = RebalanceFlags {
            monthly_due: false,
            extraordinary_due: true,
            breached_classes: vec![AssetClass::new("crypto")],
        };
        let report = executor().generate_recommendations(
            &[btc(0.7), btc(0.9)],
            &allocation,
            &portfolio(),
            &flags,
            &MarketSnapshot::new(),
        );
        let rebalance: Vec<_> = report
            .recommendations
            .iter()
            .filter(|r| r.kind.is_rebalance())
            .collect();
        assert_eq!(rebalance.len(), 1);
        assert_eq!(rebalance[0].kind, RecommendationKind::RebalanceExtraordinary);
        assert_eq!(rebalance[0].action, Action::Sell);
        assert_eq!(rebalance[0].notional, d("1800"));
        assert_eq!(rebalance[0].score, Some(0.9));
        assert!(!rebalance[0].is_actionable_by_bot());
    }

    #[test]
    fn test_rebalance_without_candidate_is_reported() {
        let mut allocation = balanced();
        allocation
            .classes
            .insert(AssetClass::new("indices"), bucket("1000", "0.4", "0.1", "-30", "3000"));
        let flags = RebalanceFlags {
            monthly_due: true,
            extraordinary_due: true,
            breached_classes: vec![AssetClass::new("indices")],
        };
        let report = executor().generate_recommendations(
            &[],
            &allocation,
            &portfolio(),
            &flags,
            &MarketSnapshot::new(),
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].asset, None);
        assert_eq!(report.dropped[0].asset_class, Some(AssetClass::new("indices")));
    }

    #[test]
    fn test_identical_inputs_give_identical_report() {
        let exec = executor();
        let signals = [btc(0.8)];
        let a = exec.generate_recommendations(&signals, &balanced(), &portfolio(), &RebalanceFlags::default(), &MarketSnapshot::new());
        let b = exec.generate_recommendations(&signals, &balanced(), &portfolio(), &RebalanceFlags::default(), &MarketSnapshot::new());
        assert_eq!(a, b);
    }
}
