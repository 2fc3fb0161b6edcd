//! REST client tests against a wiremock server.

use gateio::{Credentials, GateConfig, GateError, GateHttpClient, OrderSpec};
use wiremock::matchers::{body_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, with_creds: bool) -> GateConfig {
    let credentials = with_creds.then(|| Credentials::new("test-key", "test-secret"));
    GateConfig {
        rest_url: server.uri(),
        ws_url: "wss://unused".into(),
        credentials,
    }
}

#[tokio::test]
async fn order_book_fetch_passes_contract_depth_and_id_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/futures/usdt/order_book"))
        .and(query_param("contract", "BTC_USDT"))
        .and(query_param("limit", "20"))
        .and(query_param("with_id", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"id":100,"asks":[{"p":"57001.0","s":5}],"bids":[{"p":"57000.0","s":7}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = GateHttpClient::new(&config(&server, false)).unwrap();
    let snap = client.order_book("BTC_USDT", 20).await.unwrap();
    assert_eq!(snap.id, 100);
    assert_eq!(snap.bids[0].p, 57000.0);
}

#[tokio::test]
async fn positions_request_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/futures/usdt/positions"))
        .and(header_exists("KEY"))
        .and(header_exists("Timestamp"))
        .and(header_exists("SIGN"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"contract":"BTC_USDT","size":5}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = GateHttpClient::new(&config(&server, true)).unwrap();
    let positions = client.positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].size, 5.0);
}

#[tokio::test]
async fn positions_without_credentials_fails_locally() {
    let server = MockServer::start().await;
    let client = GateHttpClient::new(&config(&server, false)).unwrap();
    match client.positions().await {
        Err(GateError::AuthRequired(_)) => {}
        other => panic!("expected AuthRequired, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_submit_posts_specs_and_decodes_results() {
    let server = MockServer::start().await;
    let orders = vec![
        OrderSpec::limit("BTC_USDT", 3.0, "56990.0", "t-smm"),
        OrderSpec::limit("BTC_USDT", -3.0, "57010.0", "t-smm"),
    ];
    Mock::given(method("POST"))
        .and(path("/api/v4/futures/usdt/batch_orders"))
        .and(header_exists("SIGN"))
        .and(body_json(&orders))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":1,"succeeded":true,"status":"open"},
                {"id":2,"succeeded":true,"status":"open"}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = GateHttpClient::new(&config(&server, true)).unwrap();
    let results = client.submit_batch(&orders).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.succeeded));
}

#[tokio::test]
async fn batch_cancel_posts_id_strings() {
    let server = MockServer::start().await;
    let ids = vec!["11".to_string(), "12".to_string()];
    Mock::given(method("POST"))
        .and(path("/api/v4/futures/usdt/batch_cancel_orders"))
        .and(body_json(&ids))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id":"11","succeeded":true},{"id":"12","succeeded":false,"message":"ORDER_NOT_FOUND"}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = GateHttpClient::new(&config(&server, true)).unwrap();
    let results = client.cancel_batch(&ids).await.unwrap();
    assert!(results[0].succeeded);
    assert!(!results[1].succeeded);
}

#[tokio::test]
async fn oversized_batches_are_rejected_locally() {
    let server = MockServer::start().await;
    let client = GateHttpClient::new(&config(&server, true)).unwrap();

    let orders: Vec<OrderSpec> = (0..21)
        .map(|i| OrderSpec::limit("BTC_USDT", 1.0, format!("{}", 50000 + i), "t-smm"))
        .collect();
    assert!(matches!(
        client.submit_batch(&orders).await,
        Err(GateError::BatchTooLarge(21))
    ));

    let ids: Vec<String> = (0..21).map(|i| i.to_string()).collect();
    assert!(matches!(
        client.cancel_batch(&ids).await,
        Err(GateError::BatchTooLarge(21))
    ));
}

#[tokio::test]
async fn non_success_status_surfaces_as_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/futures/usdt/order_book"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_raw(r#"{"label":"INVALID_PARAM"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = GateHttpClient::new(&config(&server, false)).unwrap();
    match client.order_book("NOPE", 20).await {
        Err(GateError::Http { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("INVALID_PARAM"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}
