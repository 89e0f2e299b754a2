//! Position ledger: the single owner of simulated cash and positions.
//!
//! Every mutating operation recomputes the aggregates and persists the
//! document through [`JsonStore`]. If persisting fails the in-memory state is
//! rolled back, so memory and disk never disagree.

pub mod metrics;

use crate::domain::decimal::MONEY_DP;
use crate::domain::{
    live_price, Asset, AssetClass, CloseReason, DailyBalance, Decimal, InvalidSignal, MarketSnapshot, Portfolio,
    Position, PositionStatus, Signal, TradeLevels,
};
use crate::engine::{position_size, preview_size, SizingParams};
use crate::store::{JsonStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub use metrics::recompute;

#[derive(Debug)]
pub struct PositionLedger {
    portfolio: Portfolio,
    store: JsonStore,
    history_dir: Option<PathBuf>,
    params: SizingParams,
    asset_classes: BTreeMap<Asset, AssetClass>,
    initial_capital: Decimal,
}

impl PositionLedger {
    /// Load the persisted ledger, or start a fresh one.
    ///
    /// A missing, unreadable or malformed document yields a fresh ledger
    /// holding `initial_capital` in cash, which is persisted right away.
    /// When the document's capital differs from `initial_capital`, the
    /// document wins.
    pub fn load(store: JsonStore, initial_capital: Decimal, params: SizingParams) -> Self {
        Self::load_at(store, initial_capital, params, Utc::now())
    }

    pub fn load_at(store: JsonStore, initial_capital: Decimal, params: SizingParams, now: DateTime<Utc>) -> Self {
        let loaded = match store.load::<Portfolio>() {
            Ok(Some(mut portfolio)) => {
                if portfolio.initial_capital != initial_capital.money() {
                    warn!(
                        persisted = %portfolio.initial_capital,
                        configured = %initial_capital,
                        "initial capital differs from configuration, keeping persisted ledger"
                    );
                }
                metrics::recompute(&mut portfolio);
                Some(portfolio)
            }
            Ok(None) => {
                info!(path = %store.path().display(), "no ledger found, starting fresh");
                None
            }
            Err(e) => {
                warn!(error = %e, "ledger unreadable, starting fresh");
                None
            }
        };

        let fresh = loaded.is_none();
        let ledger = PositionLedger {
            portfolio: loaded.unwrap_or_else(|| Portfolio::new(initial_capital, now)),
            store,
            history_dir: None,
            params,
            asset_classes: BTreeMap::new(),
            initial_capital,
        };
        if fresh {
            if let Err(e) = ledger.store.save(&ledger.portfolio) {
                error!(error = %e, "failed to persist fresh ledger");
            }
        }
        ledger
    }

    /// Also write each daily snapshot to `<dir>/portfolio_YYYY-MM-DD.json`.
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = Some(dir.into());
        self
    }

    /// Asset to class mapping used by the cluster exposure limits.
    pub fn with_asset_classes(mut self, asset_classes: BTreeMap<Asset, AssetClass>) -> Self {
        self.asset_classes = asset_classes;
        self
    }

    /// Read-only view of the ledger.
    pub fn snapshot(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn params(&self) -> &SizingParams {
        &self.params
    }

    /// Size `signal` would be opened with right now.
    pub fn preview_size(&self, signal: &Signal) -> Result<Decimal, InvalidSignal> {
        preview_size(&self.portfolio, signal, &self.params)
    }

    pub fn open_position(&mut self, signal: &Signal) -> Result<Option<String>, StoreError> {
        self.open_position_at(signal, Utc::now())
    }

    /// Open a position sized from `signal`.
    ///
    /// `Ok(None)` when the signal is invalid, an open or cluster limit is
    /// reached or the size falls below the minimum notional; nothing changes
    /// in that case.
    pub fn open_position_at(&mut self, signal: &Signal, now: DateTime<Utc>) -> Result<Option<String>, StoreError> {
        let Some(levels) = self.admit(signal, &[]) else {
            return Ok(None);
        };
        let size = position_size(
            self.portfolio.current_balance,
            self.portfolio.available_cash,
            &levels,
            signal.confidence_pct(),
            &self.params,
        );
        if !self.within_limits(&signal.asset, size, &[]) {
            return Ok(None);
        }
        self.insert_position(signal, levels, size, now)
    }

    pub fn open_position_sized(&mut self, signal: &Signal, size: Decimal) -> Result<Option<String>, StoreError> {
        self.open_position_sized_at(signal, size, Utc::now())
    }

    /// Open a position at a notional fixed elsewhere, such as a broker fill.
    /// The same limits apply, and the size must be covered by available cash.
    pub fn open_position_sized_at(
        &mut self,
        signal: &Signal,
        size: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let Some(levels) = self.admit(signal, &[]) else {
            return Ok(None);
        };
        let size = size.truncate_dp(MONEY_DP);
        if size > self.portfolio.available_cash {
            info!(asset = %signal.asset, size = %size, cash = %self.portfolio.available_cash, "size exceeds available cash");
            return Ok(None);
        }
        if !self.within_limits(&signal.asset, size, &[]) {
            return Ok(None);
        }
        self.insert_position(signal, levels, size, now)
    }

    /// Notional the ledger would accept for `signal` when asked for
    /// `notional`, with `pending` orders `(asset, size)` counted as already
    /// open. Bounded by the remaining cash and the per-position cap.
    pub fn admissible_size(&self, signal: &Signal, notional: Decimal, pending: &[(Asset, Decimal)]) -> Option<Decimal> {
        self.admit(signal, pending)?;
        let reserved: Decimal = pending.iter().map(|(_, size)| *size).sum();
        let cash = self.portfolio.available_cash - reserved;
        let cap = self.portfolio.current_balance * self.params.max_position_pct;
        let size = notional.min(cash).min(cap).truncate_dp(MONEY_DP);
        self.within_limits(&signal.asset, size, pending).then_some(size)
    }

    fn class_of(&self, asset: &Asset) -> AssetClass {
        self.asset_classes.get(asset).cloned().unwrap_or_else(AssetClass::other)
    }

    /// Valid levels and room under the open-trade limits.
    fn admit(&self, signal: &Signal, pending: &[(Asset, Decimal)]) -> Option<TradeLevels> {
        let asset = &signal.asset;
        let levels = match signal.levels() {
            Ok(levels) => levels,
            Err(e) => {
                warn!(error = %e, "rejected signal");
                return None;
            }
        };

        if let Some(max) = self.params.max_open_trades {
            if self.portfolio.active_positions.len() + pending.len() >= max {
                info!(asset = %asset, max_open_trades = max, "open trade limit reached");
                return None;
            }
        }
        if let Some(max) = self.params.max_trades_per_asset {
            let open_for_asset = self
                .portfolio
                .active_positions
                .iter()
                .map(|p| &p.asset)
                .chain(pending.iter().map(|(a, _)| a))
                .filter(|a| *a == asset)
                .count();
            if open_for_asset >= max {
                info!(asset = %asset, max_trades_per_asset = max, "per-asset trade limit reached");
                return None;
            }
        }
        Some(levels)
    }

    /// Minimum notional and the class exposure cap, for a position of `size`.
    fn within_limits(&self, asset: &Asset, size: Decimal, pending: &[(Asset, Decimal)]) -> bool {
        if size < self.params.min_notional {
            info!(asset = %asset, size = %size, min_notional = %self.params.min_notional, "size below minimum notional");
            return false;
        }

        let class = self.class_of(asset);
        let Some(fraction) = self.params.cluster_limits.get(&class) else {
            return true;
        };
        let exposure: Decimal = self
            .portfolio
            .active_positions
            .iter()
            .map(|p| (&p.asset, p.position_size))
            .chain(pending.iter().map(|(a, s)| (a, *s)))
            .filter(|(a, _)| self.class_of(a) == class)
            .map(|(_, s)| s)
            .sum();
        let limit = self.portfolio.current_balance * *fraction;
        if exposure + size > limit {
            info!(
                asset = %asset,
                class = %class,
                exposure = %exposure,
                size = %size,
                limit = %limit.money(),
                "cluster exposure limit reached"
            );
            return false;
        }
        true
    }

    fn insert_position(
        &mut self,
        signal: &Signal,
        levels: TradeLevels,
        size: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let asset = &signal.asset;
        let units = (size / levels.entry).units();
        if units.is_zero() {
            info!(asset = %asset, size = %size, "size rounds to zero units");
            return Ok(None);
        }

        let confidence = signal.confidence_pct();
        let previous = self.portfolio.clone();
        let id = self.unique_id(&format!(
            "{}_{}_{}",
            asset,
            signal.direction,
            now.format("%Y%m%d_%H%M%S")
        ));
        let position = Position {
            id: id.clone(),
            asset: asset.clone(),
            direction: signal.direction,
            entry_price: levels.entry,
            target_price: levels.target,
            stop_price: levels.stop,
            position_size: size,
            units,
            confidence,
            entry_time: now,
            status: PositionStatus::Active,
            current_price: levels.entry,
            current_pnl: Decimal::zero(),
            pnl_percentage: Decimal::zero(),
            max_favorable: Decimal::zero(),
            max_adverse: Decimal::zero(),
            close_price: None,
            close_time: None,
            final_pnl: None,
            final_pnl_pct: None,
            close_reason: None,
        };
        self.portfolio.available_cash -= size;
        self.portfolio.active_positions.push(position);
        self.commit(previous)?;

        info!(
            id = %id,
            asset = %asset,
            direction = %signal.direction,
            size = %size,
            units = %units,
            confidence = confidence,
            "position opened"
        );
        Ok(Some(id))
    }

    pub fn update_positions(&mut self, prices: &MarketSnapshot) -> Result<Vec<String>, StoreError> {
        self.update_positions_at(prices, Utc::now())
    }

    /// Mark active positions to `prices` and close any that hit target or
    /// stop. Positions without a usable price are left alone. Returns the ids
    /// closed by this update.
    pub fn update_positions_at(
        &mut self,
        prices: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let previous = self.portfolio.clone();
        let mut exits = Vec::new();
        let mut marked = 0usize;

        for position in self.portfolio.active_positions.iter_mut() {
            let Some(price) = live_price(prices, &position.asset) else {
                continue;
            };
            position.mark(price);
            marked += 1;
            if let Some(reason) = position.exit_trigger(price) {
                exits.push((position.id.clone(), price, reason));
            }
        }

        if marked == 0 {
            debug!("no live prices for active positions");
            return Ok(Vec::new());
        }

        let mut closed = Vec::with_capacity(exits.len());
        for (id, price, reason) in exits {
            if self.close_in_memory(&id, price, reason, now).is_some() {
                closed.push(id);
            }
        }
        self.commit(previous)?;
        debug!(marked = marked, closed = closed.len(), "positions updated");
        Ok(closed)
    }

    pub fn close_position(
        &mut self,
        id: &str,
        close_price: Decimal,
        reason: CloseReason,
    ) -> Result<Option<Decimal>, StoreError> {
        self.close_position_at(id, close_price, reason, Utc::now())
    }

    /// Close an active position and return its realized P&L.
    ///
    /// Unknown ids (including already-closed ones) and non-positive prices
    /// are logged no-ops.
    pub fn close_position_at(
        &mut self,
        id: &str,
        close_price: Decimal,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<Option<Decimal>, StoreError> {
        if !close_price.is_positive() {
            warn!(id = %id, price = %close_price, "refusing to close at non-positive price");
            return Ok(None);
        }
        let previous = self.portfolio.clone();
        let Some(realized) = self.close_in_memory(id, close_price, reason, now) else {
            warn!(id = %id, "close requested for unknown position");
            return Ok(None);
        };
        self.commit(previous)?;
        Ok(Some(realized))
    }

    pub fn record_daily_snapshot(&mut self) -> Result<(), StoreError> {
        self.record_daily_snapshot_at(Utc::now())
    }

    /// Append today's balance to the bounded history, replacing an entry for
    /// the same date.
    pub fn record_daily_snapshot_at(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let previous = self.portfolio.clone();
        let date = now.date_naive();
        let entry = DailyBalance {
            date,
            balance: self.portfolio.current_balance,
            pnl: self.portfolio.total_pnl,
            pnl_pct: self.portfolio.total_pnl_pct,
            active_positions: self.portfolio.active_positions.len(),
            metrics: self.portfolio.performance_metrics.clone(),
        };

        let history = &mut self.portfolio.daily_balances;
        history.retain(|b| b.date != date);
        history.push(entry);
        history.sort_by_key(|b| b.date);
        let keep = self.params.history_days.max(1);
        if history.len() > keep {
            let excess = history.len() - keep;
            history.drain(..excess);
        }
        self.commit(previous)?;

        if let Some(dir) = &self.history_dir {
            let archive = JsonStore::new(dir.join(format!("portfolio_{}.json", date.format("%Y-%m-%d"))));
            if let Err(e) = archive.save(&self.portfolio) {
                warn!(error = %e, "failed to write daily history file");
            }
        }
        info!(date = %date, balance = %self.portfolio.current_balance, "daily snapshot recorded");
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.reset_at(Utc::now())
    }

    /// Replace the ledger with a fresh one holding only cash.
    pub fn reset_at(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let previous = std::mem::replace(&mut self.portfolio, Portfolio::new(self.initial_capital, now));
        self.commit(previous)?;
        warn!(initial_capital = %self.initial_capital, "ledger reset");
        Ok(())
    }

    fn close_in_memory(&mut self, id: &str, price: Decimal, reason: CloseReason, now: DateTime<Utc>) -> Option<Decimal> {
        let idx = self.portfolio.active_positions.iter().position(|p| p.id == id)?;
        let mut position = self.portfolio.active_positions.remove(idx);
        let realized = position.close(price, reason, now);
        self.portfolio.available_cash += position.position_size + realized;
        info!(
            id = %position.id,
            asset = %position.asset,
            reason = %reason,
            price = %price,
            realized_pnl = %realized,
            "position closed"
        );
        self.portfolio.closed_positions.push(position);
        Some(realized)
    }

    fn unique_id(&self, base: &str) -> String {
        let taken = |id: &str| {
            self.portfolio
                .active_positions
                .iter()
                .chain(self.portfolio.closed_positions.iter())
                .any(|p| p.id == id)
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Recompute aggregates and persist; restore `previous` if the write fails.
    fn commit(&mut self, previous: Portfolio) -> Result<(), StoreError> {
        metrics::recompute(&mut self.portfolio);
        if let Err(e) = self.store.save(&self.portfolio) {
            error!(error = %e, "ledger write failed, rolling back");
            self.portfolio = previous;
            return Err(e);
        }
        Ok(())
    }
}
