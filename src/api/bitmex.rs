use super::error::{ExchangeError, ExchangeResult, UNKNOWN_API_MESSAGE, UNKNOWN_STATUS_MESSAGE};
use super::signing::{auth_headers, expiry_from_now, Credentials};
use super::Exchange;
use crate::models::{
    BookEntry, CancelOptions, ExecInstMerge, Instrument, Leverage, LeverageOptions, Margin, Order,
    OrderBook, OrderId, OrderOptions, OrderRequest, Position, Side,
};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const API_PATH: &str = "/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

type BitmexRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// REST client for BitMEX
///
/// Stateless apart from credentials: every call is signed and sent on its
/// own, and callers are expected to serialize calls that depend on each other.
/// Cloning shares the connection pool and the optional rate limiter.
#[derive(Clone)]
pub struct BitmexClient {
    client: Client,
    credentials: Credentials,
    rate_limiter: Option<Arc<BitmexRateLimiter>>,
}

#[derive(Serialize)]
struct CancelAllBody<'a> {
    symbol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeverageBody<'a> {
    symbol: &'a str,
    leverage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_account_id: Option<i64>,
}

impl BitmexClient {
    pub fn new(credentials: Credentials) -> ExchangeResult<Self> {
        Self::with_timeout(credentials, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(credentials: Credentials, timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            rate_limiter: None,
        })
    }

    /// Throttle outgoing requests to `per_minute`
    pub fn with_rate_limit(mut self, per_minute: NonZeroU32) -> Self {
        let quota = Quota::per_minute(per_minute);
        self.rate_limiter = Some(Arc::new(RateLimiter::direct(quota)));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    // ============== Public endpoints ==============

    /// Best `depth` levels per side, re-sorted locally
    ///
    /// Endpoint: GET /orderBook/L2?symbol={symbol}&depth={depth}
    pub async fn get_order_book(&self, symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        let path = format!(
            "{}/orderBook/L2?symbol={}&depth={}",
            API_PATH,
            urlencoding::encode(symbol),
            depth
        );

        let value = self.public_get(&path).await?;
        let entries: Vec<BookEntry> = decode_records(value, "order book")?;

        Ok(OrderBook::from_entries(entries, depth))
    }

    // ============== Account state ==============

    /// Endpoint: GET /user/margin
    pub async fn get_balance(&self) -> ExchangeResult<Margin> {
        let path = format!("{}/user/margin", API_PATH);
        let value = self.signed_get(&path).await?;

        first_record(value, "margin")?
            .ok_or_else(|| decode_error("margin", "empty margin response"))
    }

    /// Endpoint: GET /position?filter={"symbol":..}
    ///
    /// `None` when the exchange has no position record for the symbol.
    pub async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<Position>> {
        let path = filtered_path("position", &json!({ "symbol": symbol }));
        let value = self.signed_get(&path).await?;

        let positions: Vec<Position> = decode_records(value, "position")?;
        Ok(positions.into_iter().find(|p| p.symbol == symbol))
    }

    /// Endpoint: GET /order?filter={"open":true,"symbol":..}
    pub async fn get_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        let path = filtered_path("order", &json!({ "symbol": symbol, "open": true }));
        let value = self.signed_get(&path).await?;

        decode_records(value, "orders")
    }

    /// Endpoint: GET /instrument?symbol={symbol}&count=1
    pub async fn get_instrument(&self, symbol: &str) -> ExchangeResult<Option<Instrument>> {
        let path = format!(
            "{}/instrument?symbol={}&count=1",
            API_PATH,
            urlencoding::encode(symbol)
        );
        let value = self.signed_get(&path).await?;

        first_record(value, "instrument")
    }

    // ============== Orders ==============

    pub async fn place_limit_order(
        &self,
        symbol: &str,
        quantity: i64,
        price: f64,
        side: Side,
        options: &OrderOptions,
    ) -> ExchangeResult<Value> {
        let order = OrderRequest::limit(symbol, quantity, price, side)
            .with_options(options, ExecInstMerge::Replace);
        self.submit_order(&order).await
    }

    /// Limit order that is rejected instead of taking liquidity
    pub async fn place_post_only_order(
        &self,
        symbol: &str,
        quantity: i64,
        price: f64,
        side: Side,
        options: &OrderOptions,
    ) -> ExchangeResult<Value> {
        let order = OrderRequest::post_only(symbol, quantity, price, side)
            .with_options(options, ExecInstMerge::Append);
        self.submit_order(&order).await
    }

    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: i64,
        options: &OrderOptions,
    ) -> ExchangeResult<Value> {
        let order = OrderRequest::market(symbol, side, quantity)
            .with_options(options, ExecInstMerge::Replace);
        self.submit_order(&order).await
    }

    /// Closing stop market order triggered at `price`
    ///
    /// `options.exec_inst` is appended after `Close`, e.g. `Close,MarkPrice`.
    pub async fn place_stop_order(
        &self,
        symbol: &str,
        price: f64,
        side: Side,
        options: &OrderOptions,
    ) -> ExchangeResult<Value> {
        let order =
            OrderRequest::stop(symbol, price, side).with_options(options, ExecInstMerge::Append);
        self.submit_order(&order).await
    }

    /// Flatten the position in `symbol` with a market order
    ///
    /// Returns `Ok(None)` without sending an order when already flat.
    pub async fn close_position_at_market(
        &self,
        symbol: &str,
        options: &OrderOptions,
    ) -> ExchangeResult<Option<Value>> {
        let position = match self.get_position(symbol).await? {
            Some(position) if position.is_open() => position,
            _ => {
                tracing::debug!(symbol, "No open position to close");
                return Ok(None);
            }
        };

        tracing::info!(
            symbol,
            current_qty = position.current_qty,
            "Closing position at market"
        );

        let order = OrderRequest::close(symbol, position.current_qty)
            .with_options(options, ExecInstMerge::Append);
        self.submit_order(&order).await.map(Some)
    }

    /// Endpoint: DELETE /order/all
    pub async fn cancel_all_orders(
        &self,
        symbol: &str,
        options: &CancelOptions,
    ) -> ExchangeResult<Value> {
        let path = format!("{}/order/all", API_PATH);
        let body = CancelAllBody {
            symbol,
            text: options.text.as_deref(),
            filter: options.filter.as_ref(),
        };

        self.signed_send(Method::DELETE, &path, &body).await
    }

    /// Endpoint: DELETE /order
    pub async fn cancel_order(
        &self,
        id: &OrderId,
        options: &CancelOptions,
    ) -> ExchangeResult<Value> {
        let path = format!("{}/order", API_PATH);

        let mut body = serde_json::Map::new();
        match id {
            OrderId::Client(cl_ord_id) => body.insert("clOrdID".to_string(), json!(cl_ord_id)),
            OrderId::Exchange(order_id) => body.insert("orderID".to_string(), json!(order_id)),
        };
        if let Some(ref text) = options.text {
            body.insert("text".to_string(), json!(text));
        }

        self.signed_send(Method::DELETE, &path, &Value::Object(body)).await
    }

    /// Endpoint: POST /position/leverage
    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: Leverage,
        options: &LeverageOptions,
    ) -> ExchangeResult<Value> {
        let path = format!("{}/position/leverage", API_PATH);
        let body = LeverageBody {
            symbol,
            leverage: leverage.as_wire(),
            target_account_id: options.target_account_id,
        };

        self.signed_send(Method::POST, &path, &body).await
    }

    async fn submit_order(&self, order: &OrderRequest) -> ExchangeResult<Value> {
        let path = format!("{}/order", API_PATH);
        self.signed_send(Method::POST, &path, order).await
    }

    // ============== Transport ==============

    async fn public_get(&self, path: &str) -> ExchangeResult<Value> {
        self.throttle().await;

        let url = format!("{}{}", self.credentials.base_url, path);
        tracing::debug!("GET {}", path);

        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }

    /// Signed request without a body; the empty string is still signed
    async fn signed_get(&self, path: &str) -> ExchangeResult<Value> {
        self.signed_request(Method::GET, path, String::new()).await
    }

    async fn signed_send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ExchangeResult<Value> {
        let body = serde_json::to_string(body)?;
        self.signed_request(method, path, body).await
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> ExchangeResult<Value> {
        self.throttle().await;

        let expires = expiry_from_now();
        let headers = auth_headers(&self.credentials, method.as_str(), path, expires, &body)?;
        let url = format!("{}{}", self.credentials.base_url, path);

        tracing::debug!("{} {} {}", method, path, body);

        let mut request = self.client.request(method, &url).headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        handle_response(response).await
    }

    async fn throttle(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl Exchange for BitmexClient {
    async fn get_balance(&self) -> ExchangeResult<Margin> {
        BitmexClient::get_balance(self).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Value> {
        BitmexClient::cancel_all_orders(self, symbol, &CancelOptions::default()).await
    }

    async fn close_position_at_market(&self, symbol: &str) -> ExchangeResult<Option<Value>> {
        BitmexClient::close_position_at_market(self, symbol, &OrderOptions::default()).await
    }

    async fn get_order_book(&self, symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        BitmexClient::get_order_book(self, symbol, depth).await
    }

    async fn set_leverage(&self, symbol: &str, leverage: Leverage) -> ExchangeResult<Value> {
        BitmexClient::set_leverage(self, symbol, leverage, &LeverageOptions::default()).await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: i64,
    ) -> ExchangeResult<Value> {
        BitmexClient::place_market_order(self, symbol, side, quantity, &OrderOptions::default())
            .await
    }
}

// ============== Response normalization ==============

/// Only 200, 201 and 202 count as success
fn is_accepted(status: StatusCode) -> bool {
    (200..=202).contains(&status.as_u16())
}

async fn handle_response(response: Response) -> ExchangeResult<Value> {
    let status = response.status();
    let body = response.text().await?;

    tracing::debug!(status = status.as_u16(), "Response received");

    normalize_response(status, &body)
}

/// Turn a status and raw body into the call result
///
/// Failures carry the exchange's `error.message` when there is one. On
/// success a single-element array is unwrapped to its element.
pub fn normalize_response(status: StatusCode, body: &str) -> ExchangeResult<Value> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|_| ExchangeError::UnparsableResponse { status })?;

    if !is_accepted(status) {
        let message = match parsed.get("error").filter(|e| !e.is_null()) {
            Some(error) => error
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_STATUS_MESSAGE)
                .to_string(),
            None => UNKNOWN_API_MESSAGE.to_string(),
        };

        tracing::warn!(status = status.as_u16(), %message, "BitMEX request failed");
        return Err(ExchangeError::Api { status, message });
    }

    Ok(match parsed {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    })
}

/// Path with a URL-encoded JSON `filter` query parameter
fn filtered_path(resource: &str, filter: &Value) -> String {
    format!(
        "{}/{}?filter={}",
        API_PATH,
        resource,
        urlencoding::encode(&filter.to_string())
    )
}

/// Undo the single-element unwrap for list endpoints
fn into_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn decode_records<T: DeserializeOwned>(value: Value, what: &'static str) -> ExchangeResult<Vec<T>> {
    into_records(value)
        .into_iter()
        .map(|record| {
            serde_json::from_value(record).map_err(|source| ExchangeError::Decode { what, source })
        })
        .collect()
}

fn first_record<T: DeserializeOwned>(value: Value, what: &'static str) -> ExchangeResult<Option<T>> {
    match into_records(value).into_iter().next() {
        Some(record) => serde_json::from_value(record)
            .map(Some)
            .map_err(|source| ExchangeError::Decode { what, source }),
        None => Ok(None),
    }
}

fn decode_error(what: &'static str, msg: &str) -> ExchangeError {
    ExchangeError::Decode {
        what,
        source: serde_json::Error::custom(msg),
    }
}
