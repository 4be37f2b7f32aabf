use hookrelay::models::{
    CancelOptions, ExecInst, Leverage, LeverageOptions, OrderId, OrderOptions,
};
use hookrelay::{BitmexClient, Credentials, ExchangeError, Side};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn client(server: &ServerGuard) -> BitmexClient {
    let credentials = Credentials::new(
        server.url(),
        "test-key".to_string(),
        "test-secret".to_string(),
    );
    BitmexClient::new(credentials).unwrap()
}

#[tokio::test]
async fn test_order_book_is_resorted_and_truncated() {
    let mut server = Server::new_async().await;
    let book = server
        .mock("GET", "/api/v1/orderBook/L2")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "XBTUSD".into()),
            Matcher::UrlEncoded("depth".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"symbol": "XBTUSD", "side": "Buy", "size": 10, "price": 19998.0},
                {"symbol": "XBTUSD", "side": "Sell", "size": 5, "price": 20002.0},
                {"symbol": "XBTUSD", "side": "Buy", "size": 7, "price": 19999.5},
                {"symbol": "XBTUSD", "side": "Sell", "size": 3, "price": 20000.5},
                {"symbol": "XBTUSD", "side": "Buy", "size": 1, "price": 19990.0},
                {"symbol": "XBTUSD", "side": "Sell", "size": 9, "price": 20001.0}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let book_result = client(&server).get_order_book("XBTUSD", 2).await.unwrap();

    book.assert_async().await;
    let bids: Vec<f64> = book_result.bids.iter().map(|l| l.price).collect();
    let asks: Vec<f64> = book_result.asks.iter().map(|l| l.price).collect();
    assert_eq!(bids, vec![19999.5, 19998.0]);
    assert_eq!(asks, vec![20000.5, 20001.0]);
    assert_eq!(book_result.touch_price(Side::Buy), Some(20000.5));
    assert_eq!(book_result.touch_price(Side::Sell), Some(19999.5));
}

#[tokio::test]
async fn test_signed_request_carries_auth_headers() {
    let mut server = Server::new_async().await;
    let margin = server
        .mock("GET", "/api/v1/user/margin")
        .match_header("api-key", "test-key")
        .match_header("api-expires", Matcher::Regex(r"^\d+$".into()))
        .match_header("api-signature", Matcher::Regex(r"^[0-9a-f]{64}$".into()))
        .match_header("content-type", "application/json")
        .match_header("accept", "application/json")
        .match_header("x-requested-with", "XMLHttpRequest")
        .with_status(200)
        .with_body(json!({"availableMargin": 100_000_000, "currency": "XBt"}).to_string())
        .create_async()
        .await;

    let balance = client(&server).get_balance().await.unwrap();

    margin.assert_async().await;
    assert_eq!(balance.available_margin, 100_000_000);
    assert_eq!(balance.currency.as_deref(), Some("XBt"));
}

#[tokio::test]
async fn test_error_envelope_message_is_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/order")
        .with_status(400)
        .with_body(
            json!({"error": {"message": "Invalid orderQty", "name": "HTTPError"}}).to_string(),
        )
        .create_async()
        .await;

    let err = client(&server)
        .place_market_order("XBTUSD", Side::Buy, 0, &OrderOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid orderQty");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
}

#[tokio::test]
async fn test_error_fallback_messages() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/user/margin")
        .with_status(401)
        .with_body(json!({"error": {"name": "HTTPError"}}).to_string())
        .create_async()
        .await;

    let err = client(&server).get_balance().await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown BitMEX API error status");

    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/user/margin")
        .with_status(500)
        .with_body(json!({"unexpected": true}).to_string())
        .create_async()
        .await;

    let err = client(&server).get_balance().await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown BitMEX API error");
}

#[tokio::test]
async fn test_non_json_body_is_unparsable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/user/margin")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let err = client(&server).get_balance().await.unwrap_err();
    assert!(matches!(err, ExchangeError::UnparsableResponse { .. }));
}

#[tokio::test]
async fn test_overload_is_flagged() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/order")
        .with_status(503)
        .with_body(
            json!({"error": {"message": "The system is currently overloaded. Please try again later."}})
                .to_string(),
        )
        .create_async()
        .await;

    let err = client(&server)
        .place_market_order("XBTUSD", Side::Sell, 100, &OrderOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_overloaded());
}

#[tokio::test]
async fn test_close_when_flat_sends_no_order() {
    // Flat shows up either as a zero-quantity record or as no record at all
    for body in [json!([{"symbol": "XBTUSD", "currentQty": 0}]), json!([])] {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/position")
            .match_query(Matcher::UrlEncoded("filter".into(), r#"{"symbol":"XBTUSD"}"#.into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let order = server
            .mock("POST", "/api/v1/order")
            .expect(0)
            .create_async()
            .await;

        let closed = client(&server)
            .close_position_at_market("XBTUSD", &OrderOptions::default())
            .await
            .unwrap();

        assert!(closed.is_none(), "flat body {}", body);
        order.assert_async().await;
    }
}

#[tokio::test]
async fn test_get_position_empty_list_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/position")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let position = client(&server).get_position("XBTUSD").await.unwrap();
    assert!(position.is_none());
}

#[tokio::test]
async fn test_single_open_order_is_still_a_list() {
    let mut server = Server::new_async().await;
    let orders = server
        .mock("GET", "/api/v1/order")
        .match_query(Matcher::UrlEncoded(
            "filter".into(),
            r#"{"open":true,"symbol":"XBTUSD"}"#.into(),
        ))
        .with_status(200)
        .with_body(
            json!([{
                "orderID": "ord-1",
                "symbol": "XBTUSD",
                "side": "Buy",
                "orderQty": 100,
                "price": 19000.0,
                "ordType": "Limit",
                "ordStatus": "New"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let open = client(&server).get_open_orders("XBTUSD").await.unwrap();

    orders.assert_async().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].order_id, "ord-1");
    assert_eq!(open[0].side, Some(Side::Buy));
    assert_eq!(open[0].order_qty, Some(100));
}

#[tokio::test]
async fn test_close_sends_opposite_quantity() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/position")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!([{"symbol": "XBTUSD", "currentQty": 37}]).to_string())
        .create_async()
        .await;
    let order = server
        .mock("POST", "/api/v1/order")
        .match_body(Matcher::PartialJson(json!({
            "symbol": "XBTUSD",
            "orderQty": -37,
            "ordType": "Market",
            "execInst": "Close"
        })))
        .with_status(200)
        .with_body(json!({"orderID": "abc", "orderQty": 37, "side": "Sell"}).to_string())
        .create_async()
        .await;

    let closed = client(&server)
        .close_position_at_market("XBTUSD", &OrderOptions::default())
        .await
        .unwrap()
        .unwrap();

    order.assert_async().await;
    assert_eq!(closed["orderID"], "abc");
}

#[tokio::test]
async fn test_single_element_response_is_unwrapped() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/api/v1/order")
        .with_status(200)
        .with_body(json!([{"orderID": "xyz", "ordStatus": "Canceled"}]).to_string())
        .create_async()
        .await;

    let cancelled = client(&server)
        .cancel_order(&OrderId::Exchange("xyz".into()), &CancelOptions::default())
        .await
        .unwrap();

    assert_eq!(cancelled["ordStatus"], "Canceled");
}

#[tokio::test]
async fn test_cancel_order_prefers_client_id() {
    let mut server = Server::new_async().await;
    let cancel = server
        .mock("DELETE", "/api/v1/order")
        .match_body(Matcher::Json(json!({"clOrdID": "mine", "text": "done"})))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let id = OrderId::resolve(Some("mine"), Some("theirs")).unwrap();
    let options = CancelOptions {
        text: Some("done".to_string()),
        ..CancelOptions::default()
    };
    client(&server).cancel_order(&id, &options).await.unwrap();

    cancel.assert_async().await;
}

#[tokio::test]
async fn test_cancel_all_orders_body() {
    let mut server = Server::new_async().await;
    let cancel = server
        .mock("DELETE", "/api/v1/order/all")
        .match_body(Matcher::Json(json!({
            "symbol": "XBTUSD",
            "text": "rollover",
            "filter": {"side": "Buy"}
        })))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let options = CancelOptions {
        text: Some("rollover".to_string()),
        filter: Some(json!({"side": "Buy"})),
    };
    client(&server)
        .cancel_all_orders("XBTUSD", &options)
        .await
        .unwrap();

    cancel.assert_async().await;
}

#[tokio::test]
async fn test_stop_order_appends_exec_inst() {
    let mut server = Server::new_async().await;
    let stop = server
        .mock("POST", "/api/v1/order")
        .match_body(Matcher::PartialJson(json!({
            "symbol": "XBTUSD",
            "side": "Sell",
            "stopPx": 18000.0,
            "ordType": "Stop",
            "execInst": "Close,MarkPrice"
        })))
        .with_status(200)
        .with_body(json!({"orderID": "stop-1"}).to_string())
        .create_async()
        .await;

    let options = OrderOptions {
        exec_inst: vec![ExecInst::MarkPrice],
        ..OrderOptions::default()
    };
    client(&server)
        .place_stop_order("XBTUSD", 18000.0, Side::Sell, &options)
        .await
        .unwrap();

    stop.assert_async().await;
}

#[tokio::test]
async fn test_cross_leverage_is_zero_on_the_wire() {
    let mut server = Server::new_async().await;
    let leverage = server
        .mock("POST", "/api/v1/position/leverage")
        .match_body(Matcher::Json(json!({"symbol": "XBTUSD", "leverage": 0.0})))
        .with_status(200)
        .with_body(json!({"symbol": "XBTUSD", "leverage": 100, "crossMargin": true}).to_string())
        .create_async()
        .await;

    client(&server)
        .set_leverage("XBTUSD", Leverage::Cross, &LeverageOptions::default())
        .await
        .unwrap();

    leverage.assert_async().await;
}
