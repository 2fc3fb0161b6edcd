//! Executor reconcile cycles against a wiremock venue.

use gateio::{Credentials, GateConfig, GateHttpClient};
use rust_decimal_macros::dec;
use smm::executor::Executor;
use smm::oms::{OrderManager, SharedOrderManager};
use smm::quote::TargetQuote;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CANCEL_PATH: &str = "/api/v4/futures/usdt/batch_cancel_orders";
const SUBMIT_PATH: &str = "/api/v4/futures/usdt/batch_orders";

fn executor_for(server: &MockServer, oms: SharedOrderManager) -> Executor {
    let config = GateConfig {
        rest_url: server.uri(),
        ws_url: "wss://unused".into(),
        credentials: Some(Credentials::new("k", "s")),
    };
    let rest = GateHttpClient::new(&config).unwrap();
    Executor::new("BTC_USDT", "t-smm", rest, oms, None)
}

fn target(bid: &str, bid_size: i64, ask: &str, ask_size: i64) -> TargetQuote {
    TargetQuote {
        contract: "BTC_USDT".into(),
        bid_price: bid.parse().unwrap(),
        bid_size: bid_size.into(),
        ask_price: ask.parse().unwrap(),
        ask_size: ask_size.into(),
    }
}

fn seed_live(oms: &SharedOrderManager, venue_id: &str, price: &str, size: i64) {
    let mut m = oms.lock();
    let internal = m.create("BTC_USDT", price.parse().unwrap(), size.into(), "t-smm");
    m.ack(&internal, venue_id, None);
}

#[tokio::test]
async fn fresh_target_submits_both_sides_and_acks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":101,"succeeded":true,"status":"open","create_time":1723000000.0},
                {"id":102,"succeeded":true,"status":"open","create_time":1723000000.0}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    let executor = executor_for(&server, oms.clone());
    executor
        .reconcile(&target("99.90", 10, "100.10", 10))
        .await
        .unwrap();

    let m = oms.lock();
    assert_eq!(m.counts(), (0, 2, 0, 0));
    let bid = m.get("101").unwrap();
    let ask = m.get("102").unwrap();
    assert_eq!(bid.side(), "buy");
    assert_eq!(bid.price, dec!(99.90));
    assert_eq!(ask.side(), "sell");
    assert_eq!(ask.size, dec!(-10));
}

#[tokio::test]
async fn per_order_reject_drops_from_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":101,"succeeded":true,"status":"open"},
                {"succeeded":false,"label":"BALANCE_NOT_ENOUGH","detail":"no margin"}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    let executor = executor_for(&server, oms.clone());
    executor
        .reconcile(&target("99.90", 10, "100.10", 10))
        .await
        .unwrap();

    // The rejected ask never reaches Live and leaves no Pending residue.
    assert_eq!(oms.lock().counts(), (0, 1, 0, 0));
}

#[tokio::test]
async fn venue_rejected_cancel_is_retried_three_times_then_skipped() {
    let server = MockServer::start().await;

    // First pass: one of two cancels is rejected by the venue.
    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":"11","succeeded":true},
                {"id":"12","succeeded":false,"message":"ORDER_NOT_FOUND"}]"#,
            "application/json",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Three immediate re-issues of the failed id, all rejected again.
    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":"12","succeeded":false,"message":"ORDER_NOT_FOUND"}]"#,
            "application/json",
        ))
        .expect(3)
        .mount(&server)
        .await;

    // Reconciliation continues with the submit regardless.
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":201,"succeeded":true,"status":"open"},
                {"id":202,"succeeded":true,"status":"open"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    seed_live(&oms, "11", "99.80", 10);
    seed_live(&oms, "12", "100.20", -10);

    let executor = executor_for(&server, oms.clone());
    executor
        .reconcile(&target("99.90", 10, "100.10", 10))
        .await
        .unwrap();

    let m = oms.lock();
    let (pending, live, cancelled, filled) = m.counts();
    assert_eq!(pending, 0);
    assert_eq!(cancelled, 1);
    assert_eq!(filled, 0);
    // "12" stays Live until the order stream settles it; the two fresh
    // orders joined it.
    assert_eq!(live, 3);
    assert!(m.get("12").is_some());
    assert!(m.get("201").is_some());
    assert!(m.get("202").is_some());
}

#[tokio::test]
async fn submit_transport_failure_leaves_no_pending_residue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    let executor = executor_for(&server, oms.clone());
    let result = executor.reconcile(&target("99.90", 10, "100.10", 10)).await;

    assert!(result.is_err());
    assert_eq!(oms.lock().counts(), (0, 0, 0, 0));
}

#[tokio::test]
async fn cancel_transport_failure_aborts_the_cycle_before_submit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .expect(0)
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    seed_live(&oms, "11", "99.80", 10);

    let executor = executor_for(&server, oms.clone());
    let result = executor.reconcile(&target("99.90", 10, "100.10", 10)).await;

    assert!(result.is_err());
    // The live order is untouched; the next book update retries.
    assert_eq!(oms.lock().counts(), (0, 1, 0, 0));
}

#[tokio::test]
async fn empty_target_only_cancels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":"11","succeeded":true}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .expect(0)
        .mount(&server)
        .await;

    let oms = OrderManager::shared();
    seed_live(&oms, "11", "99.80", 10);

    let executor = executor_for(&server, oms.clone());
    executor.reconcile(&target("0", 0, "0", 0)).await.unwrap();

    assert_eq!(oms.lock().counts(), (0, 0, 1, 0));
}
