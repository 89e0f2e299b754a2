//! Feeds backed by JSON files written by the upstream generators.

use super::{FeedError, MarketData, PriceHistory, SignalSource};
use crate::domain::{MarketSnapshot, Signal};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FeedError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| FeedError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| FeedError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Accepts either a bare list or `{"signals": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignalsDocument {
    List(Vec<Signal>),
    Wrapped { signals: Vec<Signal> },
}

#[derive(Debug, Clone)]
pub struct JsonFileSignalSource {
    path: PathBuf,
}

impl JsonFileSignalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SignalSource for JsonFileSignalSource {
    async fn fetch_signals(&self) -> Result<Vec<Signal>, FeedError> {
        let signals = match read_json::<SignalsDocument>(&self.path).await? {
            SignalsDocument::List(signals) => signals,
            SignalsDocument::Wrapped { signals } => signals,
        };
        debug!(path = %self.path.display(), count = signals.len(), "signals loaded");
        Ok(signals)
    }
}

/// Accepts either a bare `{asset: quote}` map or
/// `{"prices": {...}, "history": {asset: [price]}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MarketDocument {
    Full {
        prices: MarketSnapshot,
        #[serde(default)]
        history: PriceHistory,
    },
    Prices(MarketSnapshot),
}

#[derive(Debug, Clone)]
pub struct JsonFileMarketData {
    path: PathBuf,
}

impl JsonFileMarketData {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarketData for JsonFileMarketData {
    async fn snapshot(&self) -> Result<MarketSnapshot, FeedError> {
        Ok(match read_json::<MarketDocument>(&self.path).await? {
            MarketDocument::Full { prices, .. } => prices,
            MarketDocument::Prices(prices) => prices,
        })
    }

    async fn price_history(&self) -> Result<PriceHistory, FeedError> {
        Ok(match read_json::<MarketDocument>(&self.path).await? {
            MarketDocument::Full { history, .. } => history,
            MarketDocument::Prices(_) => PriceHistory::new(),
        })
    }
}
