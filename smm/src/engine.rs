//! Engine supervisor.
//!
//! Wires the per-contract pipelines (book feed -> quote task -> executor)
//! plus the shared inventory tracker and the user-orders router, then
//! drives the lifecycle: initialize, run until cancelled, let in-flight
//! executor cycles finish, cancel every remaining live order, close the
//! subscriptions.

use std::time::Duration;

use gateio::rest::endpoints::MAX_BATCH;
use gateio::{GateConfig, GateHttpClient, GateWsClient, UserOrder};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::{partition_cancels, Executor};
use crate::inventory::{InventoryTracker, PositionHandle};
use crate::oms::{Order, OrderManager, SharedOrderManager};
use crate::order_log::OrderLog;
use crate::policy::ContractPolicy;
use crate::quote::{QuoteGenerator, TargetQuote};
use crate::stream::BookFeed;

pub struct Engine {
    config: EngineConfig,
    gate: GateConfig,
}

impl Engine {
    pub fn new(config: EngineConfig, gate: GateConfig) -> Self {
        Self { config, gate }
    }

    /// Run the market maker until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.config.validate()?;
        info!(
            contracts = ?self.config.contracts,
            depth = self.config.depth,
            cadence = %self.config.cadence,
            strategy = %self.config.strategy,
            "starting market maker"
        );

        let rest = GateHttpClient::new(&self.gate)?;
        let ws = GateWsClient::new(&self.gate, cancel.child_token());
        let oms = OrderManager::shared();
        let order_log = match &self.config.order_log_path {
            Some(path) => Some(OrderLog::create(path)?),
            None => None,
        };

        // Inventory: seeded per trade-stream connection epoch.
        let tracker = InventoryTracker::new();
        let positions = tracker.handle();
        let trades = ws.spawn_user_trades()?;
        tokio::spawn(tracker.run(rest.clone(), trades, cancel.child_token()));

        // Private event streams routed by the supervisor.
        let mut user_orders = ws.spawn_user_orders()?;
        let mut balances = ws.spawn_user_balances()?;

        // Per-contract pipelines.
        let settle = Duration::from_millis(self.config.settle_delay_ms);
        let mut executor_handles: Vec<JoinHandle<()>> = Vec::new();
        for contract in &self.config.contracts {
            let policy = self.config.policy_for(contract);

            let deltas = ws.spawn_order_book(contract, &self.config.cadence, self.config.depth);
            let (view_tx, view_rx) = watch::channel(None);
            let feed = BookFeed::new(contract.clone(), self.config.depth, settle, rest.clone());
            tokio::spawn(feed.run(deltas.rx, view_tx, cancel.child_token()));

            let (quote_tx, quote_rx) = watch::channel(None);
            tokio::spawn(run_quote_task(
                contract.clone(),
                policy,
                view_rx,
                positions.clone(),
                quote_tx,
                cancel.child_token(),
            ));

            let executor = Executor::new(
                contract.clone(),
                self.config.strategy.clone(),
                rest.clone(),
                oms.clone(),
                order_log.clone(),
            );
            executor_handles.push(tokio::spawn(executor.run(quote_rx, cancel.child_token())));
        }

        // Supervisor loop: settle order lifecycle events into the ledger.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutting down");
                    break;
                }
                maybe = user_orders.rx.recv() => {
                    match maybe {
                        Some(event) => {
                            if let Some(order) = route_order_event(&oms, &event) {
                                if let Some(log) = &order_log {
                                    log.record(&order);
                                }
                            }
                        }
                        None => {
                            warn!("user order stream closed");
                            break;
                        }
                    }
                }
                Some(update) = balances.rx.recv() => {
                    debug!(
                        balance = update.balance,
                        change = update.change,
                        "balance update"
                    );
                }
            }
        }

        // Let in-flight executor cycles finish before the sweep.
        for handle in executor_handles {
            let _ = handle.await;
        }
        cancel_all_remaining(&rest, &oms, order_log.as_ref()).await;
        ws.close();
        Ok(())
    }
}

/// Per-contract quote task: every book update recomputes the target; the
/// threshold gate decides whether an event reaches the executor.
async fn run_quote_task(
    contract: String,
    policy: ContractPolicy,
    mut view_rx: watch::Receiver<Option<crate::book::BookView>>,
    positions: PositionHandle,
    quote_tx: watch::Sender<Option<TargetQuote>>,
    cancel: CancellationToken,
) {
    let mut generator = QuoteGenerator::new(contract.clone(), policy);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(contract = %contract, "quote task stopped");
                return;
            }
            changed = view_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let view = view_rx.borrow_and_update().clone();
                let Some(view) = view else { continue };
                let position = positions.position(&contract);
                debug!(
                    contract = %contract,
                    update_id = view.last_update_id,
                    position,
                    imbalance = crate::features::Features::new(&view.bids, &view.asks).imbalance(10),
                    "book update"
                );
                if let Some(target) = generator.on_book_update(&view, position) {
                    let _ = quote_tx.send(Some(target));
                }
            }
        }
    }
}

/// Settle a user-orders stream event into the ledger. Returns the moved
/// order, if any, for audit logging.
fn route_order_event(oms: &SharedOrderManager, event: &UserOrder) -> Option<Order> {
    if event.status != "finished" {
        return None;
    }
    let venue_id = event.id.to_string();
    match event.finish_as.as_deref() {
        Some("filled") => {
            let filled = oms.lock().mark_filled(&venue_id);
            if let Some(order) = &filled {
                info!(
                    contract = %order.contract,
                    side = order.side(),
                    price = %order.price,
                    size = %order.size,
                    "FILL"
                );
            }
            filled
        }
        Some(_) => {
            // Cancelled, liquidated, reduce-only trimmed: all leave Live.
            oms.lock().cancel(&[venue_id]).into_iter().next()
        }
        None => None,
    }
}

/// Cancel every remaining live order on shutdown, in venue-sized chunks.
async fn cancel_all_remaining(
    rest: &GateHttpClient,
    oms: &SharedOrderManager,
    order_log: Option<&OrderLog>,
) {
    let ids: Vec<String> = oms
        .lock()
        .live_orders(None, None)
        .into_iter()
        .filter_map(|o| o.venue_id)
        .collect();
    if ids.is_empty() {
        info!("no active orders - goodbye");
        return;
    }

    let mut cancelled = 0usize;
    for chunk in ids.chunks(MAX_BATCH) {
        match rest.cancel_batch(chunk).await {
            Ok(results) => {
                let (succeeded, rejected) = partition_cancels(&results);
                let moved = oms.lock().cancel(&succeeded);
                cancelled += moved.len();
                for order in &moved {
                    if let Some(log) = order_log {
                        log.record(order);
                    }
                }
                if !rejected.is_empty() {
                    warn!(ids = ?rejected, "shutdown cancels rejected");
                }
            }
            Err(e) => error!(error = %e, "shutdown cancel failed"),
        }
    }
    info!(count = cancelled, "cancelled orders - goodbye");
}
