//! WebSocket frame envelope and typed channel payloads.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::types::{de_str_f64, BookLevel};

/// Channel names used by this client.
pub const CH_ORDER_BOOK_UPDATE: &str = "futures.order_book_update";
pub const CH_USER_TRADES: &str = "futures.usertrades";
pub const CH_USER_ORDERS: &str = "futures.autoorders";
pub const CH_USER_BALANCES: &str = "futures.balances";

/// Generic JSON frame envelope: every message carries `channel` + `event`,
/// updates carry `result`, failures carry `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct WsFrame {
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Incremental order-book delta
/// (`futures.order_book_update`): applicable iff
/// `U <= last_update_id + 1 <= u`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookUpdateMsg {
    /// Contract name.
    pub s: String,
    /// First update id of the inclusive range.
    #[serde(rename = "U")]
    pub first_id: u64,
    /// Last update id of the inclusive range.
    #[serde(rename = "u")]
    pub last_id: u64,
    /// Bid deltas; size 0 removes the level.
    #[serde(default)]
    pub b: Vec<BookLevel>,
    /// Ask deltas; size 0 removes the level.
    #[serde(default)]
    pub a: Vec<BookLevel>,
}

/// One fill on the user's account (`futures.usertrades`). `size` is
/// signed: buys positive, sells negative.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTrade {
    pub contract: String,
    pub size: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub price: f64,
    #[serde(default)]
    pub create_time: f64,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Lifecycle update for one of the user's orders (`futures.autoorders`).
#[derive(Debug, Clone, Deserialize)]
pub struct UserOrder {
    pub id: i64,
    pub contract: String,
    /// `open` or `finished`.
    pub status: String,
    /// Terminal reason when `status == finished` (`filled`, `cancelled`, ...).
    #[serde(default)]
    pub finish_as: Option<String>,
    #[serde(default, deserialize_with = "de_opt_str_f64")]
    pub price: Option<f64>,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub text: Option<String>,
}

/// Margin balance change (`futures.balances`).
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceUpdate {
    #[serde(deserialize_with = "de_str_f64")]
    pub balance: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub change: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
}

fn de_opt_str_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_str_f64")] f64);
    Option::<Wrap>::deserialize(deserializer).map(|o| o.map(|w| w.0))
}

// ---------------------------------------------------------------------------
// Typed stream decoding
// ---------------------------------------------------------------------------

/// A payload type carried by one subscription channel.
pub(crate) trait StreamEvent: Sized {
    const CHANNEL: &'static str;
    fn decode(result: Value) -> serde_json::Result<Vec<Self>>;
}

impl StreamEvent for BookUpdateMsg {
    const CHANNEL: &'static str = CH_ORDER_BOOK_UPDATE;
    fn decode(result: Value) -> serde_json::Result<Vec<Self>> {
        serde_json::from_value::<BookUpdateMsg>(result).map(|m| vec![m])
    }
}

impl StreamEvent for UserTrade {
    const CHANNEL: &'static str = CH_USER_TRADES;
    fn decode(result: Value) -> serde_json::Result<Vec<Self>> {
        serde_json::from_value(result)
    }
}

impl StreamEvent for UserOrder {
    const CHANNEL: &'static str = CH_USER_ORDERS;
    fn decode(result: Value) -> serde_json::Result<Vec<Self>> {
        serde_json::from_value(result)
    }
}

impl StreamEvent for BalanceUpdate {
    const CHANNEL: &'static str = CH_USER_BALANCES;
    fn decode(result: Value) -> serde_json::Result<Vec<Self>> {
        serde_json::from_value(result)
    }
}

// ---------------------------------------------------------------------------
// Subscribe frame construction
// ---------------------------------------------------------------------------

/// Build a public subscribe frame.
pub(crate) fn subscribe_frame(channel: &str, payload: Value, time: u64) -> String {
    json!({
        "time": time,
        "channel": channel,
        "event": "subscribe",
        "payload": payload,
    })
    .to_string()
}

/// Build a private subscribe frame carrying the `api_key` auth object.
pub(crate) fn subscribe_frame_signed(
    channel: &str,
    payload: Value,
    time: u64,
    creds: &Credentials,
) -> String {
    let sign = creds.sign_ws(channel, time);
    json!({
        "time": time,
        "channel": channel,
        "event": "subscribe",
        "payload": payload,
        "auth": {
            "method": "api_key",
            "KEY": creds.api_key,
            "SIGN": sign,
        },
    })
    .to_string()
}
