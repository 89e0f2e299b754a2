use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use svfolio::domain::{PositionStatus, RecommendationKind};
use svfolio::feeds::EQUITY_CURVE_KEY;
use svfolio::ledger::recompute;
use svfolio::orchestration::state_builder::DECISION_LAYER_KEY;
use svfolio::{
    Asset, AssetClass, DecisionLayer, Decimal, Direction, JsonStore, MarketSnapshot, Portfolio, PortfolioConfig,
    Position, PriceHistory, Signal, StateBuilder,
};
use tempfile::TempDir;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

/// Mid-month, so no calendar rebalance is due.
fn mid_month() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 17, 12, 0, 0).unwrap()
}

fn layer(dir: &TempDir, config: PortfolioConfig) -> DecisionLayer {
    DecisionLayer::new(
        config,
        StateBuilder::new(
            JsonStore::new(dir.path().join("portfolio_state.json")),
            JsonStore::new(dir.path().join("portfolio_signals.json")),
        ),
    )
}

/// Targets: cash 40%, indices 40%, crypto 20%.
fn three_class_config() -> PortfolioConfig {
    PortfolioConfig {
        target_allocations: [("cash", "0.40"), ("indices", "0.40"), ("crypto", "0.20")]
            .into_iter()
            .map(|(c, w)| (AssetClass::new(c), d(w)))
            .collect(),
        ..Default::default()
    }
}

fn position(asset: &str, size: &str) -> Position {
    Position {
        id: format!("{}_LONG_20260301_000000", asset),
        asset: Asset::new(asset),
        direction: Direction::Long,
        entry_price: d("100"),
        target_price: d("200"),
        stop_price: d("50"),
        position_size: d(size),
        units: d(size) / d("100"),
        confidence: 70,
        entry_time: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        status: PositionStatus::Active,
        current_price: d("100"),
        current_pnl: Decimal::zero(),
        pnl_percentage: Decimal::zero(),
        max_favorable: Decimal::zero(),
        max_adverse: Decimal::zero(),
        close_price: None,
        close_time: None,
        final_pnl: None,
        final_pnl_pct: None,
        close_reason: None,
    }
}

/// 10k of equity split across cash, BTC and SPX.
fn portfolio(cash: &str, btc: &str, spx: &str) -> Portfolio {
    let mut p = Portfolio::new(d("10000"), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    p.available_cash = d(cash);
    p.active_positions = vec![position("BTC", btc), position("SPX", spx)];
    recompute(&mut p);
    p
}

fn signal(asset: &str, score: f64) -> Signal {
    Signal::new(asset, Direction::Long, d("100"), d("120"), d("90"))
        .with_confidence(70.0)
        .with_score(score)
}

#[test]
fn test_empty_signals_still_produce_state() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, PortfolioConfig::default());
    let ledger = Portfolio::new(d("25000"), mid_month());

    let out = layer
        .run_at(&ledger, &[], &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();

    assert!(out.state.decision_layer.routed_trades.is_empty());
    assert!(out.signals.signals.is_empty());
    assert_eq!(out.state.decision_layer.risk.cash_pct, d("100"));
    assert_eq!(out.state.decision_layer.allocation.total_equity, d("25000"));
    assert!(dir.path().join("portfolio_state.json").exists());
    assert!(dir.path().join("portfolio_signals.json").exists());
}

#[test]
fn test_low_score_signal_is_never_routed() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let ledger = portfolio("4000", "2000", "4000");

    let out = layer
        .run_at(
            &ledger,
            &[signal("BTC", 0.4), signal("SPX", 0.8)],
            &MarketSnapshot::new(),
            &PriceHistory::new(),
            mid_month(),
        )
        .unwrap();

    let routed = &out.state.decision_layer.routed_trades;
    assert!(routed.iter().all(|r| r.asset != Asset::new("BTC")));
    assert!(routed.iter().any(|r| r.asset == Asset::new("SPX")));
    assert!(out
        .state
        .decision_layer
        .dropped_signals
        .iter()
        .any(|s| s.asset == Some(Asset::new("BTC"))));
}

#[test]
fn test_eighteen_points_overweight_triggers_extraordinary_rebalance() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());

    // crypto 38% vs 20% target, cash 22% vs 40%.
    let drifted = portfolio("2200", "3800", "4000");
    let out = layer
        .run_at(&drifted, &[], &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();
    let flags = &out.state.decision_layer.rebalancing;
    assert!(flags.extraordinary_due);
    assert!(!flags.monthly_due);
    assert!(flags.breached_classes.contains(&AssetClass::new("crypto")));
    assert_eq!(
        out.signals.summary.overweight_classes,
        vec![AssetClass::new("crypto")]
    );

    // crypto 25% vs 20%: within threshold.
    let near = portfolio("3500", "2500", "4000");
    let out = layer
        .run_at(&near, &[], &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();
    assert!(!out.state.decision_layer.rebalancing.extraordinary_due);
}

#[test]
fn test_rebalance_trade_tagged_distinctly() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let drifted = portfolio("2200", "3800", "4000");

    let out = layer
        .run_at(
            &drifted,
            &[signal("BTC", 0.9)],
            &MarketSnapshot::new(),
            &PriceHistory::new(),
            mid_month(),
        )
        .unwrap();

    let rebalance: Vec<_> = out
        .signals
        .signals
        .iter()
        .filter(|r| r.kind == RecommendationKind::RebalanceExtraordinary)
        .collect();
    assert_eq!(rebalance.len(), 1);
    assert_eq!(rebalance[0].asset, Asset::new("BTC"));
    assert_eq!(rebalance[0].notional, d("1800"));
    // The signal itself is suppressed: crypto is past the overweight threshold.
    assert!(out
        .signals
        .signals
        .iter()
        .all(|r| r.kind != RecommendationKind::Signal));
}

#[test]
fn test_monthly_rebalance_day() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let first = Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap();
    let out = layer
        .run_at(
            &portfolio("4000", "2000", "4000"),
            &[],
            &MarketSnapshot::new(),
            &PriceHistory::new(),
            first,
        )
        .unwrap();
    assert!(out.state.decision_layer.rebalancing.monthly_due);
    assert!(!out.state.decision_layer.rebalancing.extraordinary_due);
}

#[test]
fn test_state_preserves_ledger_keys() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let mut ledger = portfolio("4000", "2000", "4000");
    ledger
        .extra
        .insert("brokers".to_string(), serde_json::json!({"IG": {"cash": 1000}}));

    layer
        .run_at(&ledger, &[signal("SPX", 0.8)], &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join("portfolio_state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let base = serde_json::to_value(&ledger).unwrap();
    for (key, value) in base.as_object().unwrap() {
        assert_eq!(&state[key], value, "ledger key {} altered", key);
    }
    let section = &state[DECISION_LAYER_KEY];
    for key in ["generated_at", "allocation", "risk", "routed_trades"] {
        assert!(section.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_identical_inputs_give_identical_outputs() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let ledger = portfolio("2200", "3800", "4000");
    let signals = [signal("BTC", 0.9), signal("SPX", 0.7), signal("ETH", 0.3)];

    let first = layer
        .run_at(&ledger, &signals, &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();
    let first_bytes = std::fs::read(dir.path().join("portfolio_signals.json")).unwrap();
    let second = layer
        .run_at(&ledger, &signals, &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();
    let second_bytes = std::fs::read(dir.path().join("portfolio_signals.json")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_equity_curve_overrides_balance_history() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, PortfolioConfig::default());
    let ledger = Portfolio::new(d("25000"), mid_month());

    let mut history: PriceHistory = BTreeMap::new();
    history.insert(
        EQUITY_CURVE_KEY.to_string(),
        vec![d("100"), d("120"), d("90"), d("110")],
    );
    history.insert("BTC".to_string(), vec![d("100"), d("110"), d("99")]);

    let out = layer
        .run_at(&ledger, &[], &MarketSnapshot::new(), &history, mid_month())
        .unwrap();
    let risk = &out.state.decision_layer.risk;
    assert_eq!(risk.max_drawdown_pct, d("25"));
    assert_eq!(risk.history_points, 4);
    assert_eq!(risk.asset_volatility["BTC"], d("10"));
    assert!(!risk.asset_volatility.contains_key(EQUITY_CURVE_KEY));
}

#[test]
fn test_malformed_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("portfolio_config.json");
    std::fs::write(&config_path, "not json at all").unwrap();

    let layer = DecisionLayer::from_config_file(
        &config_path,
        StateBuilder::new(
            JsonStore::new(dir.path().join("state.json")),
            JsonStore::new(dir.path().join("signals.json")),
        ),
    );
    assert_eq!(layer.config(), &PortfolioConfig::default());
    assert!(layer
        .run_at(
            &Portfolio::new(d("25000"), mid_month()),
            &[],
            &MarketSnapshot::new(),
            &PriceHistory::new(),
            mid_month()
        )
        .is_ok());
}

#[test]
fn test_state_refreshed_after_ledger_change() {
    let dir = TempDir::new().unwrap();
    let layer = layer(&dir, three_class_config());
    let before = portfolio("4000", "2000", "4000");
    let mut out = layer
        .run_at(&before, &[signal("SPX", 0.8)], &MarketSnapshot::new(), &PriceHistory::new(), mid_month())
        .unwrap();
    let section = out.state.decision_layer.clone();

    let mut after = before.clone();
    after.available_cash = d("3000");
    after.active_positions.push(position("ETH", "1000"));
    recompute(&mut after);
    layer.refresh_state(&mut out, &after).unwrap();

    assert_eq!(out.state.portfolio, after);
    assert_eq!(out.state.decision_layer, section);
    let raw = std::fs::read_to_string(dir.path().join("portfolio_state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(state["active_positions"].as_array().unwrap().len(), 3);
    assert!(state.get(DECISION_LAYER_KEY).is_some());
}
