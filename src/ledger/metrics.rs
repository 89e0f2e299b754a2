use crate::domain::decimal::{MONEY_DP, PCT_DP, RATIO_DP};
use crate::domain::{Decimal, PerformanceMetrics, Portfolio};
use crate::engine::max_drawdown_pct;

/// Recompute every derived figure of the ledger from cash and positions.
///
/// `current_balance = available_cash + total_invested + Σ unrealized`.
pub fn recompute(portfolio: &mut Portfolio) {
    let invested: Decimal = portfolio.active_positions.iter().map(|p| p.position_size).sum();
    let unrealized = portfolio.unrealized_pnl();
    let realized = portfolio.realized_pnl();

    portfolio.total_invested = invested;
    portfolio.current_balance = portfolio.available_cash + invested + unrealized;
    portfolio.total_pnl = unrealized + realized;
    portfolio.total_pnl_pct = portfolio
        .total_pnl
        .percent_of(portfolio.initial_capital)
        .round_dp(PCT_DP);
    portfolio.performance_metrics = performance(portfolio);
}

fn performance(portfolio: &Portfolio) -> PerformanceMetrics {
    let outcomes: Vec<Decimal> = portfolio
        .closed_positions
        .iter()
        .filter_map(|p| p.final_pnl)
        .collect();
    let (wins, losses): (Vec<Decimal>, Vec<Decimal>) = outcomes.iter().copied().partition(|pnl| pnl.is_positive());

    let gross_win: Decimal = wins.iter().sum();
    let gross_loss: Decimal = losses.iter().sum();
    let average = |total: Decimal, n: usize| {
        total
            .checked_div(Decimal::from(n))
            .unwrap_or_default()
            .round_dp(MONEY_DP)
    };

    PerformanceMetrics {
        total_trades: outcomes.len() as u32,
        winning_trades: wins.len() as u32,
        losing_trades: losses.len() as u32,
        win_rate: Decimal::from(wins.len())
            .percent_of(Decimal::from(outcomes.len()))
            .round_dp(PCT_DP),
        avg_win: average(gross_win, wins.len()),
        avg_loss: average(gross_loss, losses.len()),
        profit_factor: gross_win
            .checked_div(gross_loss.abs())
            .unwrap_or_default()
            .round_dp(RATIO_DP),
        max_drawdown: max_drawdown_pct(&portfolio.balance_series()).round_dp(PCT_DP),
    }
}
