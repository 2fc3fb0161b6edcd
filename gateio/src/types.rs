//! Wire types for the venue's REST API.
//!
//! The venue encodes prices as JSON strings and sizes as numbers; the
//! deserializers below normalise both to `f64`.

use serde::{Deserialize, Deserializer, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Deserialize a numeric field that the venue encodes as a JSON string.
pub(crate) fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(f64),
    }
    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Str(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        StrOrNum::Num(n) => Ok(n),
    }
}

/// One price level: `p` is string-encoded on the wire, `s` is a number.
/// `s == 0` means "remove this level" in incremental updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(deserialize_with = "de_str_f64")]
    pub p: f64,
    pub s: f64,
}

/// REST order-book snapshot
/// (`GET /api/v4/futures/usdt/order_book?contract=&limit=&with_id=true`).
#[derive(Debug, Clone, Deserialize)]
pub struct BookSnapshot {
    /// Venue-issued monotonic snapshot id.
    pub id: u64,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

/// One entry of the authenticated positions listing
/// (`GET /api/v4/futures/usdt/positions`). The venue returns many more
/// fields; only the contract and signed size matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionEntry {
    pub contract: String,
    pub size: f64,
}

/// One order of a `POST /api/v4/futures/usdt/batch_orders` body.
/// `size` is signed: positive buys, negative sells. `price` is a string.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSpec {
    pub contract: String,
    pub size: f64,
    pub price: String,
    pub tif: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: String,
    pub iceberg: i64,
    pub text: String,
    pub stp_act: String,
}

impl OrderSpec {
    /// A good-till-cancel limit order with the venue's defaults.
    pub fn limit(contract: impl Into<String>, size: f64, price: impl Into<String>, text: impl Into<String>) -> Self {
        let side = if size >= 0.0 { Side::Buy } else { Side::Sell };
        Self {
            contract: contract.into(),
            size,
            price: price.into(),
            tif: "gtc".into(),
            side,
            order_type: "limit".into(),
            iceberg: 0,
            text: text.into(),
            stp_act: "-".into(),
        }
    }
}

/// Per-order result of a batch submission. `succeeded` is strictly a
/// boolean; rejected orders carry `label`/`detail` instead of an id.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResult {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    pub succeeded: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub left: Option<f64>,
}

/// Per-order result of a batch cancellation.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelResult {
    pub id: String,
    pub succeeded: bool,
    #[serde(default)]
    pub message: Option<String>,
}
