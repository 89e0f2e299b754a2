//! Persisted portfolio ledger document.

use crate::domain::{Decimal, Position};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate trade statistics over closed positions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Percent of closed trades with positive P&L.
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    /// Average losing P&L (zero or negative).
    pub avg_loss: Decimal,
    /// Gross wins / |gross losses|; zero while there are no losses.
    pub profit_factor: Decimal,
    /// Percent, peak-to-trough over the daily balance history.
    pub max_drawdown: Decimal,
}

/// One entry of the bounded daily balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub balance: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub active_positions: usize,
    pub metrics: PerformanceMetrics,
}

/// The ledger: cash, positions and performance.
///
/// Invariant after every operation:
/// `current_balance == available_cash + total_invested + Σ active current_pnl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub created_at: DateTime<Utc>,
    pub initial_capital: Decimal,
    pub current_balance: Decimal,
    pub available_cash: Decimal,
    pub total_invested: Decimal,
    pub total_pnl: Decimal,
    pub total_pnl_pct: Decimal,
    pub active_positions: Vec<Position>,
    pub closed_positions: Vec<Position>,
    pub daily_balances: Vec<DailyBalance>,
    pub performance_metrics: PerformanceMetrics,
    /// Top-level keys written by other tools; carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Portfolio {
    /// A fresh ledger holding only cash.
    pub fn new(initial_capital: Decimal, now: DateTime<Utc>) -> Self {
        let capital = initial_capital.money();
        Portfolio {
            created_at: now,
            initial_capital: capital,
            current_balance: capital,
            available_cash: capital,
            total_invested: Decimal::zero(),
            total_pnl: Decimal::zero(),
            total_pnl_pct: Decimal::zero(),
            active_positions: Vec::new(),
            closed_positions: Vec::new(),
            daily_balances: Vec::new(),
            performance_metrics: PerformanceMetrics::default(),
            extra: BTreeMap::new(),
        }
    }

    /// Σ unrealized P&L over active positions.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.active_positions.iter().map(|p| p.current_pnl).sum()
    }

    /// Σ realized P&L over closed positions.
    pub fn realized_pnl(&self) -> Decimal {
        self.closed_positions
            .iter()
            .filter_map(|p| p.final_pnl)
            .sum()
    }

    pub fn find_active(&self, id: &str) -> Option<&Position> {
        self.active_positions.iter().find(|p| p.id == id)
    }

    /// Whether the balance identity holds exactly.
    pub fn is_balanced(&self) -> bool {
        self.current_balance == self.available_cash + self.total_invested + self.unrealized_pnl()
    }

    /// Daily balance series in chronological order.
    pub fn balance_series(&self) -> Vec<Decimal> {
        self.daily_balances.iter().map(|b| b.balance).collect()
    }
}
