//! Domain types for the portfolio decision layer.
//!
//! This module provides:
//! - Decimal wrapper for money, prices and weights
//! - Primitives: Asset, AssetClass, Direction, Action
//! - Position, Portfolio (the persisted ledger document) and Signal
//! - Broker policy table and routed trade recommendations
//! - Market quotes supplied per run

pub mod decimal;
pub mod market;
pub mod policy;
pub mod portfolio;
pub mod position;
pub mod primitives;
pub mod recommendation;
pub mod signal;

pub use decimal::Decimal;
pub use market::{live_price, MarketSnapshot, Quote};
pub use policy::{default_broker_policies, resolve_policy, BrokerPolicy, ExecutionMode};
pub use portfolio::{DailyBalance, PerformanceMetrics, Portfolio};
pub use position::{CloseReason, Position, PositionStatus};
pub use primitives::{Action, Asset, AssetClass, Direction};
pub use recommendation::{DroppedSignal, RecommendationKind, TradeRecommendation};
pub use signal::{InvalidSignal, Signal, TradeLevels};
