//! Typed endpoint methods over [`GateHttpClient`].

use crate::error::{GateError, Result};
use crate::rest::GateHttpClient;
use crate::types::{BookSnapshot, CancelResult, OrderResult, OrderSpec, PositionEntry};

/// Hard venue contract: at most 20 orders per batch request.
pub const MAX_BATCH: usize = 20;

const ORDER_BOOK: &str = "/api/v4/futures/usdt/order_book";
const POSITIONS: &str = "/api/v4/futures/usdt/positions";
const BATCH_ORDERS: &str = "/api/v4/futures/usdt/batch_orders";
const BATCH_CANCEL: &str = "/api/v4/futures/usdt/batch_cancel_orders";

impl GateHttpClient {
    /// GET /futures/usdt/order_book - depth-limited snapshot with its id.
    pub async fn order_book(&self, contract: &str, depth: usize) -> Result<BookSnapshot> {
        let limit = depth.to_string();
        self.get(
            ORDER_BOOK,
            &[("contract", contract), ("limit", &limit), ("with_id", "true")],
        )
        .await
    }

    /// GET /futures/usdt/positions - authenticated signed position listing.
    pub async fn positions(&self) -> Result<Vec<PositionEntry>> {
        self.get_signed(POSITIONS, "").await
    }

    /// POST /futures/usdt/batch_orders - submit up to [`MAX_BATCH`] orders.
    ///
    /// Per-order rejection (`succeeded=false`) is reported in the result
    /// vector, never retried here. Transport failures bubble up.
    pub async fn submit_batch(&self, orders: &[OrderSpec]) -> Result<Vec<OrderResult>> {
        if orders.len() > MAX_BATCH {
            return Err(GateError::BatchTooLarge(orders.len()));
        }
        let body = serde_json::to_string(orders)?;
        self.post_signed(BATCH_ORDERS, body).await
    }

    /// POST /futures/usdt/batch_cancel_orders - cancel up to [`MAX_BATCH`]
    /// orders by venue id.
    pub async fn cancel_batch(&self, order_ids: &[String]) -> Result<Vec<CancelResult>> {
        if order_ids.len() > MAX_BATCH {
            return Err(GateError::BatchTooLarge(order_ids.len()));
        }
        let body = serde_json::to_string(order_ids)?;
        self.post_signed(BATCH_CANCEL, body).await
    }
}
