use crate::broker::{BrokerError, BrokerSet, OrderConfirmation};
use crate::domain::{Asset, Decimal, Signal, TradeRecommendation};
use crate::ledger::PositionLedger;
use crate::store::StoreError;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

/// What happened to the routed trades of one run.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub confirmations: Vec<OrderConfirmation>,
    /// Ledger positions opened for confirmed orders.
    pub opened: Vec<String>,
    /// Recommendation key and the broker's error.
    pub failed: Vec<(String, BrokerError)>,
    /// Keys of bot recommendations the ledger could not take.
    pub skipped: Vec<String>,
    /// Recommendations left for a human (notify mode or rebalance-only).
    pub not_submitted: usize,
}

/// Submit bot-mode, signal-driven recommendations and mirror each
/// confirmed order into the simulated ledger.
///
/// Order sizes are settled against the ledger first, in recommendation
/// order, so the broker is asked for exactly the notional the ledger will
/// record. Orders then go out concurrently and confirmed fills are opened
/// one at a time at the confirmed size. Broker failures are collected, not
/// returned; only a ledger write failure aborts.
pub async fn dispatch(
    recommendations: &[TradeRecommendation],
    signals: &[Signal],
    brokers: &BrokerSet,
    ledger: &mut PositionLedger,
) -> Result<DispatchOutcome, StoreError> {
    let (actionable, manual): (Vec<&TradeRecommendation>, Vec<&TradeRecommendation>) =
        recommendations.iter().partition(|r| r.is_actionable_by_bot());

    let mut outcome = DispatchOutcome {
        not_submitted: manual.len(),
        ..Default::default()
    };

    let mut pending: Vec<(Asset, Decimal)> = Vec::new();
    let mut orders: Vec<(&TradeRecommendation, &Signal, Decimal)> = Vec::new();
    for rec in actionable {
        let Some(signal) = signals
            .iter()
            .find(|s| s.asset == rec.asset && s.direction.opening_action() == rec.action)
        else {
            warn!(key = %rec.key, asset = %rec.asset, "recommendation has no matching signal");
            outcome.skipped.push(rec.key.clone());
            continue;
        };
        match ledger.admissible_size(signal, rec.notional, &pending) {
            Some(size) => {
                if size != rec.notional {
                    debug!(key = %rec.key, routed = %rec.notional, size = %size, "order resized to ledger limits");
                }
                pending.push((rec.asset.clone(), size));
                orders.push((rec, signal, size));
            }
            None => {
                info!(key = %rec.key, asset = %rec.asset, "ledger cannot take the trade, not submitted");
                outcome.skipped.push(rec.key.clone());
            }
        }
    }

    let submissions = orders.into_iter().map(|(rec, signal, size)| async move {
        let result = match brokers.get(&rec.broker) {
            Some(broker) => broker.submit_order(&rec.asset, rec.action, size).await,
            None => Err(BrokerError::NotConfigured(rec.broker.clone())),
        };
        (rec, signal, result)
    });

    for (rec, signal, result) in join_all(submissions).await {
        let confirmation = match result {
            Ok(confirmation) => confirmation,
            Err(e) => {
                warn!(key = %rec.key, asset = %rec.asset, broker = %rec.broker, error = %e, "order failed");
                outcome.failed.push((rec.key.clone(), e));
                continue;
            }
        };

        match ledger.open_position_sized(signal, confirmation.size)? {
            Some(id) => outcome.opened.push(id),
            None => error!(
                key = %rec.key,
                order_id = %confirmation.order_id,
                size = %confirmation.size,
                "confirmed order could not be recorded in the ledger"
            ),
        }
        outcome.confirmations.push(confirmation);
    }

    info!(
        submitted = outcome.confirmations.len(),
        opened = outcome.opened.len(),
        failed = outcome.failed.len(),
        skipped = outcome.skipped.len(),
        not_submitted = outcome.not_submitted,
        "dispatch complete"
    );
    Ok(outcome)
}
