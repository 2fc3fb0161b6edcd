//! Execution executor: reconciles the target quote against live orders.
//!
//! One executor task per contract, fed by a `watch` channel so only the
//! latest target matters (older unprocessed targets are overwritten).
//! Each cycle runs to completion before the next: cancel everything live
//! on the contract, then submit the fresh two-sided batch. Cancellations
//! rejected by the venue are re-issued immediately up to three times;
//! submissions are never blindly retried.

use gateio::rest::endpoints::MAX_BATCH;
use gateio::{CancelResult, GateHttpClient, OrderSpec};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::oms::SharedOrderManager;
use crate::order_log::OrderLog;
use crate::quote::TargetQuote;

/// Re-issues of a venue-rejected cancellation after the initial attempt.
const CANCEL_RETRIES: usize = 3;

pub struct Executor {
    contract: String,
    strategy: String,
    rest: GateHttpClient,
    oms: SharedOrderManager,
    order_log: Option<OrderLog>,
}

impl Executor {
    pub fn new(
        contract: impl Into<String>,
        strategy: impl Into<String>,
        rest: GateHttpClient,
        oms: SharedOrderManager,
        order_log: Option<OrderLog>,
    ) -> Self {
        Self {
            contract: contract.into(),
            strategy: strategy.into(),
            rest,
            oms,
            order_log,
        }
    }

    /// Consume quote-change events until cancelled. Events are strictly
    /// ordered per contract and each cycle finishes before the next
    /// starts.
    pub async fn run(
        self,
        mut quote_rx: watch::Receiver<Option<TargetQuote>>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(contract = %self.contract, "executor stopped");
                    return;
                }
                changed = quote_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let target = quote_rx.borrow_and_update().clone();
                    let Some(target) = target else { continue };
                    if let Err(e) = self.reconcile(&target).await {
                        // Transport failure: the target stays un-posted;
                        // the next book update retries.
                        error!(contract = %self.contract, error = %e, "reconcile failed");
                    }
                }
            }
        }
    }

    /// One reconciliation cycle: cancel, then submit.
    pub async fn reconcile(&self, target: &TargetQuote) -> Result<()> {
        self.cancel_contract_orders().await?;
        self.submit_target(target).await
    }

    /// Cancel every live order on this contract, re-issuing venue-rejected
    /// ids up to [`CANCEL_RETRIES`] times, then give up on the leftovers
    /// (they may already be filled; the order stream settles them).
    pub async fn cancel_contract_orders(&self) -> Result<()> {
        let mut remaining = self.oms.lock().live_venue_ids(&self.contract);
        if remaining.is_empty() {
            return Ok(());
        }

        for attempt in 0..=CANCEL_RETRIES {
            let mut failed = Vec::new();
            for chunk in remaining.chunks(MAX_BATCH) {
                let results = self.rest.cancel_batch(chunk).await?;
                let (succeeded, rejected) = partition_cancels(&results);
                let moved = self.oms.lock().cancel(&succeeded);
                for order in &moved {
                    self.log_order(order);
                }
                failed.extend(rejected);
            }
            if failed.is_empty() {
                return Ok(());
            }
            debug!(
                contract = %self.contract,
                attempt,
                failed = failed.len(),
                "cancel rejected, re-issuing"
            );
            remaining = failed;
        }

        warn!(
            contract = %self.contract,
            ids = ?remaining,
            "cancels still rejected after retries, continuing"
        );
        Ok(())
    }

    /// Submit the target's non-empty sides and route per-order results
    /// into the manager.
    async fn submit_target(&self, target: &TargetQuote) -> Result<()> {
        let specs = build_specs(target, &self.strategy);
        if specs.is_empty() {
            return Ok(());
        }

        info!(
            contract = %self.contract,
            bid = %format_side(target.bid_price, target.bid_size),
            ask = %format_side(target.ask_price, target.ask_size),
            "QUOTE"
        );

        for chunk in specs.chunks(MAX_BATCH) {
            // Pending entries exist only while their chunk is in flight.
            let internal_ids: Vec<String> = {
                let mut oms = self.oms.lock();
                chunk
                    .iter()
                    .map(|spec| {
                        oms.create(
                            &spec.contract,
                            spec.price.parse().unwrap_or_default(),
                            Decimal::from_f64_retain(spec.size).unwrap_or_default(),
                            &self.strategy,
                        )
                    })
                    .collect()
            };

            let results = match self.rest.submit_batch(chunk).await {
                Ok(results) => results,
                Err(e) => {
                    // Nothing was acknowledged: drop the pending entries.
                    let mut oms = self.oms.lock();
                    for id in &internal_ids {
                        oms.reject(id);
                    }
                    return Err(e.into());
                }
            };

            for (internal_id, result) in internal_ids.iter().zip(results.iter()) {
                if result.succeeded {
                    if let Some(venue_id) = result.id {
                        let acked = self.oms.lock().ack(
                            internal_id,
                            venue_id.to_string(),
                            result.create_time,
                        );
                        if let Some(order) = acked {
                            self.log_order(&order);
                        }
                        continue;
                    }
                }
                let rejected = self.oms.lock().reject(internal_id);
                if let Some(order) = &rejected {
                    self.log_order(order);
                }
                warn!(
                    contract = %self.contract,
                    label = result.label.as_deref().unwrap_or("-"),
                    detail = result.detail.as_deref().unwrap_or("-"),
                    "order rejected"
                );
            }
        }
        Ok(())
    }

    fn log_order(&self, order: &crate::oms::Order) {
        if let Some(log) = &self.order_log {
            log.record(order);
        }
    }
}

// ---------------------------------------------------------------------------
// Pure helpers (unit-testable)
// ---------------------------------------------------------------------------

/// Split cancel results into (succeeded ids, venue-rejected ids).
pub fn partition_cancels(results: &[CancelResult]) -> (Vec<String>, Vec<String>) {
    let mut succeeded = Vec::new();
    let mut rejected = Vec::new();
    for result in results {
        if result.succeeded {
            succeeded.push(result.id.clone());
        } else {
            rejected.push(result.id.clone());
        }
    }
    (succeeded, rejected)
}

/// Build the venue batch for a target quote, skipping empty sides.
/// Bid sizes submit positive, ask sizes negative.
pub fn build_specs(target: &TargetQuote, strategy: &str) -> Vec<OrderSpec> {
    let mut specs = Vec::with_capacity(2);
    if target.has_bid() {
        specs.push(OrderSpec::limit(
            target.contract.clone(),
            target.bid_size.to_f64().unwrap_or(0.0),
            target.bid_price.to_string(),
            strategy,
        ));
    }
    if target.has_ask() {
        specs.push(OrderSpec::limit(
            target.contract.clone(),
            -target.ask_size.to_f64().unwrap_or(0.0),
            target.ask_price.to_string(),
            strategy,
        ));
    }
    specs
}

fn format_side(price: Decimal, size: Decimal) -> String {
    if size > Decimal::ZERO {
        format!("{price}x{size}")
    } else {
        "--".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateio::types::Side;
    use rust_decimal_macros::dec;

    fn target(bid_price: Decimal, bid_size: Decimal, ask_price: Decimal, ask_size: Decimal) -> TargetQuote {
        TargetQuote {
            contract: "BTC_USDT".into(),
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        }
    }

    #[test]
    fn build_specs_signs_sizes_by_side() {
        let specs = build_specs(&target(dec!(99.9), dec!(3), dec!(100.1), dec!(2)), "t-smm");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].side, Side::Buy);
        assert_eq!(specs[0].size, 3.0);
        assert_eq!(specs[0].price, "99.9");
        assert_eq!(specs[1].side, Side::Sell);
        assert_eq!(specs[1].size, -2.0);
        assert_eq!(specs[1].price, "100.1");
        assert!(specs.iter().all(|s| s.text == "t-smm"));
    }

    #[test]
    fn build_specs_skips_empty_sides() {
        let bid_only = build_specs(&target(dec!(99.9), dec!(3), Decimal::ZERO, Decimal::ZERO), "t-smm");
        assert_eq!(bid_only.len(), 1);
        assert_eq!(bid_only[0].side, Side::Buy);

        let none = build_specs(&target(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO), "t-smm");
        assert!(none.is_empty());
    }

    #[test]
    fn partition_cancels_splits_on_succeeded() {
        let results: Vec<CancelResult> = serde_json::from_str(
            r#"[{"id":"1","succeeded":true},
                {"id":"2","succeeded":false,"message":"ORDER_NOT_FOUND"},
                {"id":"3","succeeded":true}]"#,
        )
        .unwrap();
        let (ok, bad) = partition_cancels(&results);
        assert_eq!(ok, vec!["1".to_string(), "3".to_string()]);
        assert_eq!(bad, vec!["2".to_string()]);
    }

    #[test]
    fn chunking_respects_the_venue_batch_limit() {
        let ids: Vec<String> = (0..45).map(|i| i.to_string()).collect();
        let chunks: Vec<_> = ids.chunks(MAX_BATCH).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[2].len(), 5);
    }
}
