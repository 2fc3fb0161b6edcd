//! Order manager: the single source of truth for order state.
//!
//! Every order lives in exactly one of four collections. The executor
//! creates Pending entries, promotes them to Live on venue ack, and the
//! engine settles them into Cancelled or Filled from the user-orders
//! stream. Rejected submissions are dropped from Pending and handed back
//! to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Lifecycle state of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Live,
    Cancelled,
    Filled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Live => "live",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

/// One order's lifecycle record. `size` is signed: positive bids,
/// negative asks. `venue_id` is set exactly when the order leaves
/// Pending via an ack.
#[derive(Debug, Clone)]
pub struct Order {
    pub internal_id: String,
    pub venue_id: Option<String>,
    pub contract: String,
    pub price: Decimal,
    pub size: Decimal,
    pub strategy: String,
    pub created_ts_local: f64,
    pub created_ts_venue: Option<f64>,
    pub status: OrderStatus,
}

impl Order {
    pub fn side(&self) -> &'static str {
        if self.size >= Decimal::ZERO {
            "buy"
        } else {
            "sell"
        }
    }
}

/// Shared handle: the manager is queried from the executor tasks and the
/// engine's order-stream router.
pub type SharedOrderManager = Arc<Mutex<OrderManager>>;

/// Ledger of pending / live / terminal orders.
#[derive(Debug, Default)]
pub struct OrderManager {
    pending: HashMap<String, Order>,
    live: HashMap<String, Order>,
    cancelled: HashMap<String, Order>,
    filled: HashMap<String, Order>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedOrderManager {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Allocate an internal id and insert a Pending order.
    pub fn create(
        &mut self,
        contract: impl Into<String>,
        price: Decimal,
        size: Decimal,
        strategy: impl Into<String>,
    ) -> String {
        let internal_id = Uuid::new_v4().to_string();
        let order = Order {
            internal_id: internal_id.clone(),
            venue_id: None,
            contract: contract.into(),
            price,
            size,
            strategy: strategy.into(),
            created_ts_local: unix_seconds_f64(),
            created_ts_venue: None,
            status: OrderStatus::Pending,
        };
        self.pending.insert(internal_id.clone(), order);
        internal_id
    }

    /// Promote a Pending order to Live with its venue identity.
    pub fn ack(
        &mut self,
        internal_id: &str,
        venue_id: impl Into<String>,
        venue_ts: Option<f64>,
    ) -> Option<Order> {
        let mut order = self.pending.remove(internal_id)?;
        let venue_id = venue_id.into();
        order.venue_id = Some(venue_id.clone());
        order.created_ts_venue = venue_ts;
        order.status = OrderStatus::Live;
        self.live.insert(venue_id, order.clone());
        Some(order)
    }

    /// Drop a rejected submission from Pending and report it back.
    pub fn reject(&mut self, internal_id: &str) -> Option<Order> {
        let mut order = self.pending.remove(internal_id)?;
        order.status = OrderStatus::Rejected;
        Some(order)
    }

    /// Move Live orders to Cancelled. Unknown ids are skipped. Returns
    /// the moved orders.
    pub fn cancel(&mut self, venue_ids: &[String]) -> Vec<Order> {
        let mut moved = Vec::new();
        for id in venue_ids {
            if let Some(mut order) = self.live.remove(id) {
                order.status = OrderStatus::Cancelled;
                self.cancelled.insert(id.clone(), order.clone());
                moved.push(order);
            }
        }
        moved
    }

    /// Move one Live order to Filled.
    pub fn mark_filled(&mut self, venue_id: &str) -> Option<Order> {
        let mut order = self.live.remove(venue_id)?;
        order.status = OrderStatus::Filled;
        self.filled.insert(venue_id.to_string(), order.clone());
        Some(order)
    }

    /// Live orders, optionally filtered by strategy tag and/or contract.
    pub fn live_orders(&self, strategy: Option<&str>, contract: Option<&str>) -> Vec<Order> {
        self.live
            .values()
            .filter(|o| strategy.is_none_or(|s| o.strategy == s))
            .filter(|o| contract.is_none_or(|c| o.contract == c))
            .cloned()
            .collect()
    }

    /// Venue ids of all Live orders on a contract.
    pub fn live_venue_ids(&self, contract: &str) -> Vec<String> {
        self.live
            .values()
            .filter(|o| o.contract == contract)
            .filter_map(|o| o.venue_id.clone())
            .collect()
    }

    pub fn get(&self, venue_id: &str) -> Option<Order> {
        self.live.get(venue_id).cloned()
    }

    /// (pending, live, cancelled, filled) sizes.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.pending.len(),
            self.live.len(),
            self.cancelled.len(),
            self.filled.len(),
        )
    }
}

fn unix_seconds_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
