pub mod broker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod ledger;
pub mod orchestration;
pub mod store;

pub use broker::{Broker, BrokerError, BrokerSet, OrderConfirmation, PaperBroker};
pub use config::{Config, PortfolioConfig};
pub use domain::{
    Action, Asset, AssetClass, CloseReason, Decimal, Direction, MarketSnapshot, Portfolio, Position, Quote, Signal,
    TradeRecommendation,
};
pub use error::AppError;
pub use feeds::{JsonFileMarketData, JsonFileSignalSource, MarketData, PriceHistory, SignalSource, StaticFeed};
pub use ledger::PositionLedger;
pub use orchestration::{dispatch, DecisionError, DecisionLayer, DecisionOutputs, StateBuilder};
pub use store::{JsonStore, StoreError, WriterLock};
