//! Per-contract book feed task.
//!
//! Owns a [`ContractBook`] and drives its bootstrap state machine:
//! buffer deltas, fetch a REST snapshot after a settle delay, drain, then
//! apply deltas directly. A sequence gap, crossed book, or stale snapshot
//! schedules another snapshot round; resync is a state transition inside
//! this task, never a re-entrant call. Every successful install or apply
//! publishes a [`BookView`] through a `watch` channel.

use std::time::Duration;

use gateio::{BookUpdateMsg, GateHttpClient};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::book::{ApplyOutcome, BookView, ContractBook, InstallOutcome};

/// Delay before retrying after a failed or stale snapshot.
const SNAPSHOT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Book feed for one contract.
pub struct BookFeed {
    contract: String,
    depth: usize,
    /// Buffering dwell time before the snapshot request, on the order of
    /// one stream cadence interval.
    settle_delay: Duration,
    rest: GateHttpClient,
}

impl BookFeed {
    pub fn new(
        contract: impl Into<String>,
        depth: usize,
        settle_delay: Duration,
        rest: GateHttpClient,
    ) -> Self {
        Self {
            contract: contract.into(),
            depth,
            settle_delay,
            rest,
        }
    }

    /// Run until cancelled or the delta stream closes.
    pub async fn run(
        self,
        mut delta_rx: mpsc::Receiver<BookUpdateMsg>,
        view_tx: watch::Sender<Option<BookView>>,
        cancel: CancellationToken,
    ) {
        let mut book = ContractBook::new(self.contract.clone(), self.depth);
        let mut snapshot_due: Option<Instant> = Some(Instant::now() + self.settle_delay);

        loop {
            let snapshot_sleep = match snapshot_due {
                Some(at) => time::sleep_until(at),
                None => time::sleep_until(Instant::now() + Duration::from_secs(86400)),
            };
            let snapshot_pending = snapshot_due.is_some();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(contract = %self.contract, "book feed stopped");
                    return;
                }

                maybe = delta_rx.recv() => {
                    let Some(msg) = maybe else {
                        warn!(contract = %self.contract, "delta stream closed");
                        return;
                    };
                    if msg.s != self.contract {
                        continue;
                    }
                    match book.handle_update(msg) {
                        ApplyOutcome::Applied => {
                            let _ = view_tx.send(Some(book.view()));
                        }
                        ApplyOutcome::Buffered | ApplyOutcome::Ignored => {}
                        ApplyOutcome::NeedsResync => {
                            warn!(
                                contract = %self.contract,
                                "sequence gap, resyncing"
                            );
                            snapshot_due = Some(Instant::now() + self.settle_delay);
                        }
                    }
                }

                _ = snapshot_sleep, if snapshot_pending => {
                    snapshot_due = None;
                    match self.rest.order_book(&self.contract, self.depth).await {
                        Ok(snapshot) => match book.install_snapshot(&snapshot) {
                            InstallOutcome::Ready => {
                                info!(
                                    contract = %self.contract,
                                    update_id = book.last_update_id(),
                                    "book initialized"
                                );
                                let _ = view_tx.send(Some(book.view()));
                            }
                            InstallOutcome::Stale => {
                                warn!(
                                    contract = %self.contract,
                                    snapshot_id = snapshot.id,
                                    "stale snapshot discarded"
                                );
                                snapshot_due = Some(Instant::now() + SNAPSHOT_RETRY_DELAY);
                            }
                            InstallOutcome::NeedsResync => {
                                warn!(
                                    contract = %self.contract,
                                    "gap behind snapshot, resyncing"
                                );
                                snapshot_due = Some(Instant::now() + self.settle_delay);
                            }
                        },
                        Err(e) => {
                            error!(contract = %self.contract, error = %e, "snapshot fetch failed");
                            snapshot_due = Some(Instant::now() + SNAPSHOT_RETRY_DELAY);
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// run_book (CLI stdout mode, used by `smm book`)
// ---------------------------------------------------------------------------

/// Stream one contract's reconstructed book to stdout as TSV, one line per
/// accepted update: `update_id  best_bid  bid_size  best_ask  ask_size  mid`.
pub async fn run_book(
    contract: &str,
    depth: usize,
    cadence: &str,
    cancel: CancellationToken,
) -> crate::error::Result<()> {
    use std::io::{self, BufWriter, Write};

    let gate = gateio::GateConfig::usdt_futures(None);
    let rest = GateHttpClient::new(&gate)?;
    let ws = gateio::GateWsClient::new(&gate, cancel.clone());

    let deltas = ws.spawn_order_book(contract, cadence, depth);
    let (view_tx, mut view_rx) = watch::channel(None);
    let feed = BookFeed::new(contract, depth, Duration::from_secs(2), rest);
    tokio::spawn(feed.run(deltas.rx, view_tx, cancel.clone()));

    let stdout = io::stdout().lock();
    let mut writer = BufWriter::new(stdout);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = writer.flush();
                return Ok(());
            }
            changed = view_rx.changed() => {
                if changed.is_err() {
                    let _ = writer.flush();
                    return Ok(());
                }
                let view = view_rx.borrow_and_update().clone();
                let Some(view) = view else { continue };
                let (bid, ask) = match (view.bids.first(), view.asks.first()) {
                    (Some(b), Some(a)) => (*b, *a),
                    _ => continue,
                };
                let mid = (bid.price + ask.price) / 2.0;
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    view.last_update_id, bid.price, bid.size, ask.price, ask.size, mid
                )?;
                writer.flush()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateio::types::BookLevel;
    use gateio::{Credentials, GateConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rest_for(server: &MockServer) -> GateHttpClient {
        let config = GateConfig {
            rest_url: server.uri(),
            ws_url: "wss://unused".into(),
            credentials: Some(Credentials::new("k", "s")),
        };
        GateHttpClient::new(&config).unwrap()
    }

    fn update(first: u64, last: u64, b: Vec<(f64, f64)>, a: Vec<(f64, f64)>) -> BookUpdateMsg {
        BookUpdateMsg {
            s: "BTC_USDT".into(),
            first_id: first,
            last_id: last,
            b: b.into_iter().map(|(p, s)| BookLevel { p, s }).collect(),
            a: a.into_iter().map(|(p, s)| BookLevel { p, s }).collect(),
        }
    }

    async fn next_view(rx: &mut watch::Receiver<Option<BookView>>) -> BookView {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("view timeout")
            .expect("view channel closed");
        rx.borrow_and_update().clone().expect("view present")
    }

    #[tokio::test]
    async fn bootstrap_merges_buffered_deltas_into_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/order_book"))
            .and(query_param("contract", "BTC_USDT"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":100,"bids":[{"p":"100.0","s":5}],"asks":[{"p":"100.5","s":4}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (delta_tx, delta_rx) = mpsc::channel(64);
        let (view_tx, mut view_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        // Queue the deltas before the settle delay elapses.
        delta_tx.send(update(95, 99, vec![(98.0, 9.0)], vec![])).await.unwrap();
        delta_tx.send(update(100, 103, vec![(99.9, 7.0)], vec![])).await.unwrap();
        delta_tx.send(update(104, 107, vec![], vec![(100.6, 2.0)])).await.unwrap();

        let feed = BookFeed::new("BTC_USDT", 20, Duration::from_millis(50), rest_for(&server));
        let handle = tokio::spawn(feed.run(delta_rx, view_tx, cancel.clone()));

        let view = next_view(&mut view_rx).await;
        assert_eq!(view.last_update_id, 107);
        assert!(view.bids.iter().any(|l| l.price == 99.9));
        assert!(view.bids.iter().all(|l| l.price != 98.0));
        assert!(view.asks.iter().any(|l| l.price == 100.6));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn live_gap_requests_a_fresh_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/order_book"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":100,"bids":[{"p":"100.0","s":5}],"asks":[{"p":"100.5","s":4}]}"#,
                "application/json",
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/order_book"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":200,"bids":[{"p":"101.0","s":5}],"asks":[{"p":"101.5","s":4}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (delta_tx, delta_rx) = mpsc::channel(64);
        let (view_tx, mut view_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let feed = BookFeed::new("BTC_USDT", 20, Duration::from_millis(20), rest_for(&server));
        let handle = tokio::spawn(feed.run(delta_rx, view_tx, cancel.clone()));

        let first = next_view(&mut view_rx).await;
        assert_eq!(first.last_update_id, 100);

        // Gap: U=110 > 101 forces a resync onto the second snapshot.
        delta_tx.send(update(110, 112, vec![(99.0, 1.0)], vec![])).await.unwrap();
        let second = next_view(&mut view_rx).await;
        assert_eq!(second.last_update_id, 200);
        assert_eq!(second.bids[0].price, 101.0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
