//! Append-only CSV audit log of order lifecycle transitions.
//!
//! One row per transition. Logging failures degrade to a warning and
//! never interrupt trading.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::oms::Order;

const HEADER: [&str; 8] = [
    "timestamp",
    "order_id",
    "contract",
    "price",
    "size",
    "side",
    "status",
    "strategy",
];

/// Cloneable handle to the shared CSV writer.
#[derive(Clone)]
pub struct OrderLog {
    writer: Arc<Mutex<csv::Writer<std::fs::File>>>,
}

impl OrderLog {
    /// Open (or create) the log file, writing the header only when the
    /// file is new or empty.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Record one lifecycle transition.
    pub fn record(&self, order: &Order) {
        let order_id = order
            .venue_id
            .clone()
            .unwrap_or_else(|| order.internal_id.clone());
        let row = [
            Utc::now().to_rfc3339(),
            order_id,
            order.contract.clone(),
            order.price.to_string(),
            order.size.to_string(),
            order.side().to_string(),
            order.status.as_str().to_string(),
            order.strategy.clone(),
        ];
        let mut writer = self.writer.lock();
        if let Err(e) = writer.write_record(&row) {
            warn!(error = %e, "order log write failed");
            return;
        }
        if let Err(e) = writer.flush() {
            warn!(error = %e, "order log flush failed");
        }
    }
}
