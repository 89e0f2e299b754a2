//! Simulated position and its lifecycle.

use crate::domain::decimal::{MONEY_DP, PCT_DP};
use crate::domain::{Asset, Decimal, Direction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Active,
    Closed,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TargetHit,
    StopHit,
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TargetHit => write!(f, "TARGET_HIT"),
            CloseReason::StopHit => write!(f, "STOP_HIT"),
            CloseReason::Manual => write!(f, "MANUAL"),
        }
    }
}

/// One simulated trade.
///
/// Active positions are mutated by price updates; once closed the record is
/// history and is never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// `ASSET_DIRECTION_YYYYmmdd_HHMMSS`, suffixed on collision.
    pub id: String,
    pub asset: Asset,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_price: Decimal,
    /// Notional committed from cash at open.
    pub position_size: Decimal,
    /// `position_size / entry_price`.
    pub units: Decimal,
    /// 0-100.
    pub confidence: u8,
    pub entry_time: DateTime<Utc>,
    pub status: PositionStatus,
    pub current_price: Decimal,
    /// Unrealized P&L while active.
    pub current_pnl: Decimal,
    pub pnl_percentage: Decimal,
    /// Best unrealized P&L seen while active.
    pub max_favorable: Decimal,
    /// Worst unrealized P&L seen while active.
    pub max_adverse: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_pnl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_pnl_pct: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// P&L of the whole position if marked at `price`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let per_unit = (price - self.entry_price) * Decimal::from(self.direction.sign());
        (per_unit * self.units).round_dp(MONEY_DP)
    }

    /// Refresh the mark price, unrealized P&L and excursions.
    pub fn mark(&mut self, price: Decimal) {
        let pnl = self.pnl_at(price);
        self.current_price = price;
        self.current_pnl = pnl;
        self.pnl_percentage = pnl.percent_of(self.position_size).round_dp(PCT_DP);
        if pnl > self.max_favorable {
            self.max_favorable = pnl;
        }
        if pnl < self.max_adverse {
            self.max_adverse = pnl;
        }
    }

    /// Exit condition reached at `price`, if any.
    ///
    /// Target is checked before stop, so a tick that somehow satisfies both
    /// closes as `TargetHit`.
    pub fn exit_trigger(&self, price: Decimal) -> Option<CloseReason> {
        match self.direction {
            Direction::Long => {
                if price >= self.target_price {
                    Some(CloseReason::TargetHit)
                } else if price <= self.stop_price {
                    Some(CloseReason::StopHit)
                } else {
                    None
                }
            }
            Direction::Short => {
                if price <= self.target_price {
                    Some(CloseReason::TargetHit)
                } else if price >= self.stop_price {
                    Some(CloseReason::StopHit)
                } else {
                    None
                }
            }
        }
    }

    /// Mark the position closed at `close_price` and return the realized P&L.
    pub fn close(
        &mut self,
        close_price: Decimal,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Decimal {
        let realized = self.pnl_at(close_price);
        self.current_price = close_price;
        self.current_pnl = realized;
        self.pnl_percentage = realized.percent_of(self.position_size).round_dp(PCT_DP);
        self.status = PositionStatus::Closed;
        self.close_price = Some(close_price);
        self.close_time = Some(now);
        self.final_pnl = Some(realized);
        self.final_pnl_pct = Some(self.pnl_percentage);
        self.close_reason = Some(reason);
        realized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn position(direction: Direction, entry: &str, target: &str, stop: &str) -> Position {
        Position {
            id: "BTC_LONG_20260101_000000".to_string(),
            asset: Asset::new("BTC"),
            direction,
            entry_price: d(entry),
            target_price: d(target),
            stop_price: d(stop),
            position_size: d("1000"),
            units: d("10"),
            confidence: 70,
            entry_time: Utc::now(),
            status: PositionStatus::Active,
            current_price: d(entry),
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

    #[test]
    fn test_long_pnl_and_excursions() {
        let mut pos = position(Direction::Long, "100", "120", "90");
        pos.mark(d("110"));
        assert_eq!(pos.current_pnl, d("100"));
        assert_eq!(pos.pnl_percentage, d("10"));
        pos.mark(d("95"));
        assert_eq!(pos.current_pnl, d("-50"));
        assert_eq!(pos.max_favorable, d("100"));
        assert_eq!(pos.max_adverse, d("-50"));
    }

    #[test]
    fn test_short_pnl_is_inverted() {
        let mut pos = position(Direction::Short, "100", "80", "110");
        pos.mark(d("90"));
        assert_eq!(pos.current_pnl, d("100"));
        assert_eq!(pos.exit_trigger(d("80")), Some(CloseReason::TargetHit));
        assert_eq!(pos.exit_trigger(d("111")), Some(CloseReason::StopHit));
        assert_eq!(pos.exit_trigger(d("95")), None);
    }

    #[test]
    fn test_target_checked_before_stop() {
        // Degenerate levels where one price satisfies both conditions.
        let pos = position(Direction::Long, "100", "90", "95");
        assert_eq!(pos.exit_trigger(d("90")), Some(CloseReason::TargetHit));
    }

    #[test]
    fn test_close_records_history_fields() {
        let mut pos = position(Direction::Long, "100", "120", "90");
        let realized = pos.close(d("121"), CloseReason::TargetHit, Utc::now());
        assert_eq!(realized, d("210"));
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.final_pnl, Some(d("210")));
        assert_eq!(pos.final_pnl_pct, Some(d("21")));
        assert_eq!(pos.close_reason, Some(CloseReason::TargetHit));
    }

    #[test]
    fn test_close_reason_serialization() {
        let json = serde_json::to_string(&CloseReason::TargetHit).unwrap();
        assert_eq!(json, "\"TARGET_HIT\"");
    }
}
