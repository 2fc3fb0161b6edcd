//! WebSocket subscriptions.
//!
//! One reader task per subscription: each [`GateWsClient::spawn_*`] call
//! opens its own connection, sends the subscribe frame (re-signed on every
//! reconnect for private channels), and forwards decoded payloads to a
//! bounded channel. The connection loop carries protocol-ping keepalive,
//! pong deadlines, stale detection, and reconnect with delay.

pub mod events;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{unix_seconds, Credentials};
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use events::{
    subscribe_frame, subscribe_frame_signed, BalanceUpdate, BookUpdateMsg, StreamEvent, UserOrder,
    UserTrade, WsFrame, CH_ORDER_BOOK_UPDATE, CH_USER_BALANCES, CH_USER_ORDERS, CH_USER_TRADES,
};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Bounded per-subscription delivery queue.
const CHANNEL_CAPACITY: usize = 1024;

/// A live subscription: decoded payloads plus a connection-epoch counter
/// that is bumped on every (re)connect. Consumers that must re-seed state
/// after a reconnect (the inventory tracker) watch the epoch.
pub struct StreamHandle<T> {
    pub rx: mpsc::Receiver<T>,
    pub epoch: watch::Receiver<u64>,
}

/// Factory for per-subscription reader tasks.
#[derive(Debug, Clone)]
pub struct GateWsClient {
    ws_url: String,
    credentials: Option<Credentials>,
    cancel: CancellationToken,
}

impl GateWsClient {
    pub fn new(config: &GateConfig, cancel: CancellationToken) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            credentials: config.credentials.clone(),
            cancel,
        }
    }

    /// Subscribe to incremental order-book updates for one contract.
    pub fn spawn_order_book(
        &self,
        contract: &str,
        cadence: &str,
        depth: usize,
    ) -> StreamHandle<BookUpdateMsg> {
        let contract = contract.to_string();
        let cadence = cadence.to_string();
        let depth = depth.to_string();
        self.spawn_stream(Box::new(move || {
            vec![subscribe_frame(
                CH_ORDER_BOOK_UPDATE,
                json!([contract, cadence, depth]),
                unix_seconds(),
            )]
        }))
    }

    /// Subscribe to the user's fills.
    pub fn spawn_user_trades(&self) -> Result<StreamHandle<UserTrade>> {
        self.spawn_private(CH_USER_TRADES)
    }

    /// Subscribe to the user's order lifecycle events.
    pub fn spawn_user_orders(&self) -> Result<StreamHandle<UserOrder>> {
        self.spawn_private(CH_USER_ORDERS)
    }

    /// Subscribe to the user's margin balance changes.
    pub fn spawn_user_balances(&self) -> Result<StreamHandle<BalanceUpdate>> {
        self.spawn_private(CH_USER_BALANCES)
    }

    /// Stop every reader task spawned by this client.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    fn spawn_private<T>(&self, channel: &'static str) -> Result<StreamHandle<T>>
    where
        T: StreamEvent + Send + 'static,
    {
        let creds = self
            .credentials
            .clone()
            .ok_or(GateError::AuthRequired(channel))?;
        Ok(self.spawn_stream(Box::new(move || {
            let t = unix_seconds();
            vec![subscribe_frame_signed(channel, json!(["!all"]), t, &creds)]
        })))
    }

    /// Spawn the reconnecting reader task for one subscription.
    fn spawn_stream<T>(&self, make_frames: Box<dyn Fn() -> Vec<String> + Send + Sync>) -> StreamHandle<T>
    where
        T: StreamEvent + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (epoch_tx, epoch_rx) = watch::channel(0u64);
        let url = self.ws_url.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            info!(channel = T::CHANNEL, "subscription starting");
            loop {
                match run_subscription::<T>(&url, &*make_frames, &tx, &epoch_tx, &cancel).await {
                    Ok(()) => {
                        info!(channel = T::CHANNEL, "subscription stopped");
                        return;
                    }
                    Err(e) => {
                        warn!(channel = T::CHANNEL, error = %e, "subscription error");
                        if cancel.is_cancelled() {
                            return;
                        }
                        tokio::select! {
                            _ = time::sleep(RECONNECT_DELAY) => {}
                            _ = cancel.cancelled() => return,
                        }
                    }
                }
            }
        });

        StreamHandle {
            rx,
            epoch: epoch_rx,
        }
    }
}

/// Single connection lifetime for one subscription.
async fn run_subscription<T>(
    url: &str,
    make_frames: &(dyn Fn() -> Vec<String> + Send + Sync),
    tx: &mpsc::Sender<T>,
    epoch_tx: &watch::Sender<u64>,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: StreamEvent,
{
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| GateError::WebSocket(format!("connect failed: {e}")))?;
    let (mut sink, mut stream) = ws_stream.split();

    epoch_tx.send_modify(|e| *e += 1);
    info!(channel = T::CHANNEL, "connected");

    for frame in make_frames() {
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| GateError::WebSocket(format!("subscribe failed: {e}")))?;
    }

    let mut last_message_time = Instant::now();
    let mut ping_interval = time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut stale_interval = time::interval(STALE_CHECK_INTERVAL);
    stale_interval.tick().await;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_timeout_fut = match pong_deadline {
            Some(d) => time::sleep_until(d),
            None => time::sleep_until(Instant::now() + Duration::from_secs(86400)),
        };
        let pong_active = pong_deadline.is_some();

        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_message_time = Instant::now();
                        if !dispatch_text::<T>(&text, tx).await {
                            // Receiver dropped: the consumer is gone.
                            let _ = sink.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_message_time = Instant::now();
                        sink.send(Message::Pong(data))
                            .await
                            .map_err(|e| GateError::WebSocket(e.to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_message_time = Instant::now();
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(_))) => return Err(GateError::ConnectionClosed),
                    Some(Ok(_)) => { last_message_time = Instant::now(); }
                    Some(Err(e)) => return Err(GateError::WebSocket(e.to_string())),
                    None => return Err(GateError::ConnectionClosed),
                }
            }
            _ = ping_interval.tick() => {
                sink.send(Message::Ping(vec![]))
                    .await
                    .map_err(|e| GateError::WebSocket(e.to_string()))?;
                pong_deadline = Some(Instant::now() + PONG_TIMEOUT);
            }
            _ = stale_interval.tick() => {
                let elapsed = last_message_time.elapsed();
                if elapsed > STALE_THRESHOLD {
                    return Err(GateError::StaleConnection(elapsed.as_millis() as u64));
                }
            }
            _ = pong_timeout_fut, if pong_active => {
                return Err(GateError::PongTimeout);
            }
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}

/// Decode one text frame and forward its payloads.
///
/// Returns `false` when the consumer side has been dropped. Unparseable
/// frames are dropped and logged (protocol-error policy).
async fn dispatch_text<T: StreamEvent>(text: &str, tx: &mpsc::Sender<T>) -> bool {
    let frame: WsFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "unparseable frame dropped");
            return true;
        }
    };

    if let Some(error) = &frame.error {
        warn!(channel = %frame.channel, error = %error, "venue error frame");
        return true;
    }

    match frame.event.as_str() {
        "subscribe" => {
            info!(channel = %frame.channel, "subscribed");
            true
        }
        "update" if frame.channel == T::CHANNEL => {
            let Some(result) = frame.result else {
                debug!(channel = %frame.channel, "update frame without result");
                return true;
            };
            match T::decode(result) {
                Ok(items) => {
                    for item in items {
                        if tx.send(item).await.is_err() {
                            return false;
                        }
                    }
                    true
                }
                Err(e) => {
                    debug!(channel = %frame.channel, error = %e, "undecodable update dropped");
                    true
                }
            }
        }
        _ => true,
    }
}
