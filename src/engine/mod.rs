//! Pure computation for the decision layer: sizing, allocation drift,
//! risk evaluation, rebalance triggers and trade routing.

pub mod allocator;
pub mod rebalance;
pub mod risk;
pub mod router;
pub mod sizing;

pub use allocator::{AllocationState, Allocator, ClassAllocation};
pub use rebalance::{RebalanceFlags, RebalancePolicy};
pub use risk::{max_drawdown_pct, volatility_pct, RiskAssessor, RiskFlag, RiskLimits, RiskSnapshot};
pub use router::{PortfolioExecutor, RoutingReport, TradeThresholds};
pub use sizing::{confidence_multiplier, position_size, preview_size, SizingParams};
