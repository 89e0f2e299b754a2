use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use svfolio::domain::ExecutionMode;
use svfolio::{
    dispatch, AppError, Broker, BrokerSet, Config, DecisionLayer, JsonFileMarketData, JsonFileSignalSource, JsonStore,
    MarketData, MarketSnapshot, PaperBroker, PortfolioConfig, PositionLedger, PriceHistory, SignalSource,
    StateBuilder, WriterLock,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("invalid environment configuration")?;
    let _lock = WriterLock::acquire(&config.lock_file).context("another process owns the ledger")?;

    let portfolio_config = PortfolioConfig::load(&config.portfolio_config_file);
    let mut ledger = PositionLedger::load(
        JsonStore::new(&config.ledger_file),
        config.initial_capital,
        portfolio_config.sizing.clone(),
    )
    .with_asset_classes(portfolio_config.asset_classes.clone())
    .with_history_dir(&config.history_dir);

    if config.reset_portfolio {
        ledger.reset().context("failed to reset ledger")?;
    }

    // Bot-mode venues are simulated; notify-mode ones never receive orders.
    let brokers: BrokerSet = portfolio_config
        .brokers
        .iter()
        .filter(|p| p.mode == ExecutionMode::Bot)
        .map(|p| {
            let broker: Arc<dyn Broker> = Arc::new(PaperBroker::new(p.broker.as_str()));
            (p.broker.clone(), broker)
        })
        .collect();

    let signal_source: Option<Box<dyn SignalSource>> = config
        .signals_input
        .as_ref()
        .map(|p| Box::new(JsonFileSignalSource::new(p)) as Box<dyn SignalSource>);
    let market_data: Option<Box<dyn MarketData>> = config
        .prices_input
        .as_ref()
        .map(|p| Box::new(JsonFileMarketData::new(p)) as Box<dyn MarketData>);

    info!(
        ledger = %config.ledger_file.display(),
        balance = %ledger.snapshot().current_balance,
        tick_secs = config.tick_secs,
        brokers = brokers.len(),
        "decision layer started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.tick_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = tick(&config, &mut ledger, signal_source.as_deref(), market_data.as_deref(), &brokers).await {
                    error!(error = %e, "tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

async fn tick(
    config: &Config,
    ledger: &mut PositionLedger,
    signal_source: Option<&dyn SignalSource>,
    market_data: Option<&dyn MarketData>,
    brokers: &BrokerSet,
) -> Result<(), AppError> {
    let (market, history) = match market_data {
        Some(feed) => match feed.snapshot().await {
            Ok(snapshot) => {
                let history = feed.price_history().await.unwrap_or_else(|e| {
                    warn!(error = %e, "price history unavailable");
                    PriceHistory::new()
                });
                (snapshot, history)
            }
            Err(e) => {
                warn!(error = %e, "market data unavailable");
                (MarketSnapshot::new(), PriceHistory::new())
            }
        },
        None => (MarketSnapshot::new(), PriceHistory::new()),
    };

    if !market.is_empty() {
        let closed = ledger.update_positions(&market)?;
        if !closed.is_empty() {
            info!(closed = ?closed, "positions closed on update");
        }
    }

    let signals = match signal_source {
        Some(source) => source.fetch_signals().await.unwrap_or_else(|e| {
            warn!(error = %e, "signals unavailable, running allocation and risk only");
            Vec::new()
        }),
        None => Vec::new(),
    };

    let layer = DecisionLayer::from_config_file(
        &config.portfolio_config_file,
        StateBuilder::new(JsonStore::new(&config.state_file), JsonStore::new(&config.signals_file)),
    );
    let mut outputs = layer.run(ledger.snapshot(), &signals, &market, &history)?;
    let outcome = dispatch(&outputs.signals.signals, &signals, brokers, ledger).await?;
    if !outcome.opened.is_empty() {
        layer.refresh_state(&mut outputs, ledger.snapshot())?;
    }
    ledger.record_daily_snapshot()?;
    Ok(())
}
