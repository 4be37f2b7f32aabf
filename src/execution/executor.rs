use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::Instrument as _;
use uuid::Uuid;

use super::sizing::{position_size, SizingParams};
use crate::api::{Exchange, ExchangeError};
use crate::models::{Leverage, Side};

/// Order book depth needed to find the touch price
const BOOK_DEPTH: usize = 1;

/// Workflow step, used to say where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Balance,
    CancelOrders,
    ClosePosition,
    OrderBook,
    Leverage,
    SubmitOrder,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Balance => "fetch balance",
            Step::CancelOrders => "cancel open orders",
            Step::ClosePosition => "close position",
            Step::OrderBook => "fetch order book",
            Step::Leverage => "set leverage",
            Step::SubmitOrder => "submit order",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{step} failed: {source}")]
    Exchange {
        step: Step,
        #[source]
        source: ExchangeError,
    },

    #[error("{instrument} book has no price to {side} into")]
    EmptyBook { instrument: String, side: Side },

    #[error("Computed order quantity for {instrument} is zero")]
    ZeroQuantity { instrument: String },
}

impl ExecutionError {
    /// Step that failed, for exchange errors
    pub fn step(&self) -> Option<Step> {
        match self {
            ExecutionError::Exchange { step, .. } => Some(*step),
            _ => None,
        }
    }
}

fn failed_at(step: Step) -> impl FnOnce(ExchangeError) -> ExecutionError {
    move |source| ExecutionError::Exchange { step, source }
}

/// Outcome of one successful rollover
#[derive(Debug, Clone)]
pub struct RolloverReport {
    pub instrument: String,
    pub side: Side,
    pub available_margin: i64,
    /// Close order response, `None` when already flat
    pub closed_position: Option<Value>,
    pub reference_price: f64,
    pub quantity: i64,
    /// Entry order response
    pub order: Value,
}

/// Flattens an instrument and re-enters at a size derived from available margin
///
/// Holds no state between runs. Callers must not overlap runs on the same
/// account; nothing here guards against it.
pub struct Executor<E> {
    exchange: E,
    sizing: SizingParams,
}

impl<E: Exchange> Executor<E> {
    pub fn new(exchange: E, sizing: SizingParams) -> Self {
        Self { exchange, sizing }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn sizing(&self) -> &SizingParams {
        &self.sizing
    }

    /// Cancel, flatten and re-enter `instrument` on `side`
    ///
    /// Stops at the first failing step. Steps already done are not undone.
    pub async fn execute(
        &self,
        instrument: &str,
        side: Side,
    ) -> Result<RolloverReport, ExecutionError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("rollover", %run_id, instrument, %side);

        self.run(instrument, side).instrument(span).await
    }

    async fn run(&self, instrument: &str, side: Side) -> Result<RolloverReport, ExecutionError> {
        // 1. How much margin there is to play with
        let margin = self
            .exchange
            .get_balance()
            .await
            .map_err(failed_at(Step::Balance))?;
        tracing::info!(available_margin = margin.available_margin, "Fetched balance");

        // 2. Drop anything still resting on this instrument
        self.exchange
            .cancel_all_orders(instrument)
            .await
            .map_err(failed_at(Step::CancelOrders))?;
        tracing::info!("Cancelled open orders");

        // 3. Flatten existing exposure
        let closed_position = self
            .exchange
            .close_position_at_market(instrument)
            .await
            .map_err(failed_at(Step::ClosePosition))?;
        if closed_position.is_some() {
            tracing::info!("Closed existing position");
        } else {
            tracing::info!("No position to close");
        }

        // 4-5. Price the incoming order would cross at
        let book = self
            .exchange
            .get_order_book(instrument, BOOK_DEPTH)
            .await
            .map_err(failed_at(Step::OrderBook))?;
        let reference_price = book
            .touch_price(side)
            .ok_or_else(|| ExecutionError::EmptyBook {
                instrument: instrument.to_string(),
                side,
            })?;

        // 6-8. Size from margin and price
        let quantity = position_size(reference_price, margin.available_margin, &self.sizing);
        if quantity <= 0 {
            tracing::warn!(reference_price, "Balance too small for a single contract");
            return Err(ExecutionError::ZeroQuantity {
                instrument: instrument.to_string(),
            });
        }

        // 9. Cross margin
        self.exchange
            .set_leverage(instrument, Leverage::Cross)
            .await
            .map_err(failed_at(Step::Leverage))?;

        tracing::info!(reference_price, "{}ing {} {} contracts", side, quantity, instrument);

        // 10. Enter
        let order = self
            .exchange
            .place_market_order(instrument, side, quantity)
            .await
            .map_err(failed_at(Step::SubmitOrder))?;

        Ok(RolloverReport {
            instrument: instrument.to_string(),
            side,
            available_margin: margin.available_margin,
            closed_position,
            reference_price,
            quantity,
            order,
        })
    }
}
