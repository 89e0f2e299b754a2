//! Inbound collaborators: signal source and market data.

use crate::domain::{Decimal, MarketSnapshot, Signal};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod file;

pub use file::{JsonFileMarketData, JsonFileSignalSource};

/// Price series per asset; the `equity_curve` key, when present, stands in
/// for the ledger's daily balances.
pub type PriceHistory = BTreeMap<String, Vec<Decimal>>;

/// Key in [`PriceHistory`] that overrides the balance history.
pub const EQUITY_CURVE_KEY: &str = "equity_curve";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed {} unreadable: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("feed {} malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Supplies the incoming trade signals for one run.
#[async_trait]
pub trait SignalSource: Send + Sync + fmt::Debug {
    async fn fetch_signals(&self) -> Result<Vec<Signal>, FeedError>;
}

/// Supplies `{asset: {price, change_pct}}` snapshots.
#[async_trait]
pub trait MarketData: Send + Sync + fmt::Debug {
    async fn snapshot(&self) -> Result<MarketSnapshot, FeedError>;

    async fn price_history(&self) -> Result<PriceHistory, FeedError> {
        Ok(PriceHistory::new())
    }
}

/// Fixed signals and prices, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    signals: Vec<Signal>,
    market: MarketSnapshot,
    history: PriceHistory,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals.extend(signals);
        self
    }

    pub fn with_market(mut self, market: MarketSnapshot) -> Self {
        self.market = market;
        self
    }

    pub fn with_history(mut self, history: PriceHistory) -> Self {
        self.history = history;
        self
    }
}

#[async_trait]
impl SignalSource for StaticFeed {
    async fn fetch_signals(&self) -> Result<Vec<Signal>, FeedError> {
        Ok(self.signals.clone())
    }
}

#[async_trait]
impl MarketData for StaticFeed {
    async fn snapshot(&self) -> Result<MarketSnapshot, FeedError> {
        Ok(self.market.clone())
    }

    async fn price_history(&self) -> Result<PriceHistory, FeedError> {
        Ok(self.history.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, Direction, Quote};

    #[test]
    fn test_static_feed_serves_fixed_data() {
        tokio_test::block_on(async {
            let mut market = MarketSnapshot::new();
            market.insert(Asset::new("BTC"), Quote::new(Decimal::from(88_100i64)));
            let feed = StaticFeed::new()
                .with_signals(vec![Signal::new(
                    "BTC",
                    Direction::Long,
                    Decimal::from(86_000i64),
                    Decimal::from(88_000i64),
                    Decimal::from(84_000i64),
                )])
                .with_market(market.clone());

            assert_eq!(feed.fetch_signals().await.unwrap().len(), 1);
            assert_eq!(feed.snapshot().await.unwrap(), market);
            assert!(feed.price_history().await.unwrap().is_empty());
        });
    }
}
