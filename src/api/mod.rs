pub mod bitmex;
pub mod error;
pub mod signing;

pub use bitmex::BitmexClient;
pub use error::{ExchangeError, ExchangeResult};
pub use signing::Credentials;

use crate::models::{Leverage, Margin, OrderBook, Side};
use async_trait::async_trait;
use serde_json::Value;

/// The exchange operations the rollover workflow needs
///
/// Implemented by [`BitmexClient`]; tests substitute a recording fake.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_balance(&self) -> ExchangeResult<Margin>;

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Value>;

    /// `Ok(None)` when there was nothing to close
    async fn close_position_at_market(&self, symbol: &str) -> ExchangeResult<Option<Value>>;

    async fn get_order_book(&self, symbol: &str, depth: usize) -> ExchangeResult<OrderBook>;

    async fn set_leverage(&self, symbol: &str, leverage: Leverage) -> ExchangeResult<Value>;

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: i64,
    ) -> ExchangeResult<Value>;
}
