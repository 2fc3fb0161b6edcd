//! Per-contract inventory, seeded from REST and updated by the user-trade
//! stream.
//!
//! The tracker task owns the write path; readers (the per-contract quote
//! tasks) share a cheap [`PositionHandle`]. On every reconnect of the
//! trade stream the tracker re-seeds from REST and discards buffered
//! trade events older than the seed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gateio::ws::StreamHandle;
use gateio::{GateHttpClient, PositionEntry, UserTrade};
use parking_lot::RwLock;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay between seed attempts when the positions endpoint fails.
const SEED_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Shared read handle over the position map.
#[derive(Debug, Clone, Default)]
pub struct PositionHandle {
    positions: Arc<RwLock<HashMap<String, f64>>>,
}

impl PositionHandle {
    /// Signed position for a contract; unknown contracts are flat.
    pub fn position(&self, contract: &str) -> f64 {
        self.positions.read().get(contract).copied().unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.positions.read().clone()
    }
}

/// Inventory tracker state machine.
#[derive(Debug, Default)]
pub struct InventoryTracker {
    handle: PositionHandle,
    /// Unix-seconds timestamp of the last authoritative seed. Trade
    /// events created before it are already reflected in the seed.
    seed_time: f64,
}

impl InventoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> PositionHandle {
        self.handle.clone()
    }

    /// Replace the whole map with an authoritative REST snapshot.
    pub fn seed(&mut self, entries: &[PositionEntry], seed_time: f64) {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            map.insert(entry.contract.clone(), entry.size);
        }
        *self.handle.positions.write() = map;
        self.seed_time = seed_time;
        info!(positions = entries.len(), "inventory seeded");
    }

    /// Apply one trade event in receive order. Events that predate the
    /// seed are already counted by it and are dropped.
    pub fn apply_trade(&mut self, trade: &UserTrade) {
        if trade.create_time < self.seed_time {
            debug!(
                contract = %trade.contract,
                create_time = trade.create_time,
                "trade predates seed, dropped"
            );
            return;
        }
        let mut map = self.handle.positions.write();
        let position = map.entry(trade.contract.clone()).or_insert(0.0);
        *position += trade.size;
        debug!(contract = %trade.contract, size = trade.size, position = *position, "position updated");
    }

    /// Run the tracker: seed once per connection epoch, fold trades
    /// in between.
    pub async fn run(
        mut self,
        rest: GateHttpClient,
        mut stream: StreamHandle<UserTrade>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("inventory tracker stopped");
                    return;
                }
                changed = stream.epoch.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Trade stream (re)connected: the REST snapshot becomes
                    // authoritative again.
                    self.reseed(&rest, &cancel).await;
                }
                maybe = stream.rx.recv() => {
                    match maybe {
                        Some(trade) => self.apply_trade(&trade),
                        None => {
                            warn!("trade stream closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn reseed(&mut self, rest: &GateHttpClient, cancel: &CancellationToken) {
        loop {
            let seed_time = gateio::auth::unix_seconds() as f64;
            match rest.positions().await {
                Ok(entries) => {
                    self.seed(&entries, seed_time);
                    return;
                }
                Err(e) => {
                    error!(error = %e, "position seed failed, retrying");
                    tokio::select! {
                        _ = time::sleep(SEED_RETRY_DELAY) => {}
                        _ = cancel.cancelled() => return,
                    }
                }
            }
        }
    }
}
