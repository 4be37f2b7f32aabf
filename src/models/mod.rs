pub mod order;

pub use order::{
    CancelOptions, ExecInst, ExecInstMerge, LeverageOptions, OrdType, OrderId, OrderOptions,
    OrderRequest, TimeInForce,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Side::Buy),
            "Sell" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}' (expected Buy or Sell)", other)),
        }
    }
}

/// Raw level-2 entry as returned by `/orderBook/L2`
#[derive(Debug, Clone, Deserialize)]
pub struct BookEntry {
    #[serde(default)]
    pub symbol: String,
    pub side: Side,
    #[serde(default)]
    pub size: f64,
    pub price: f64,
}

/// One price level of the book
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Order book snapshot
///
/// Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Split mixed-side entries and sort each side, truncating to `depth`.
    ///
    /// The upstream ordering is ignored.
    pub fn from_entries(entries: Vec<BookEntry>, depth: usize) -> Self {
        let (buys, sells): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.side == Side::Buy);

        let level = |e: BookEntry| BookLevel {
            price: e.price,
            size: e.size,
        };

        let mut bids: Vec<BookLevel> = buys.into_iter().map(level).collect();
        let mut asks: Vec<BookLevel> = sells.into_iter().map(level).collect();

        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        bids.truncate(depth);
        asks.truncate(depth);

        Self { bids, asks }
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Price an incoming order on `side` would cross at: best ask for a buy,
    /// best bid for a sell.
    pub fn touch_price(&self, side: Side) -> Option<f64> {
        match side {
            Side::Buy => self.best_ask(),
            Side::Sell => self.best_bid(),
        }
        .map(|level| level.price)
    }
}

/// Margin account state from `/user/margin`
///
/// All amounts are in satoshi (XBt).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Margin {
    pub available_margin: i64,
    #[serde(default)]
    pub wallet_balance: Option<i64>,
    #[serde(default)]
    pub margin_balance: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Position in one instrument
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    /// Signed contract count: positive long, negative short
    #[serde(default)]
    pub current_qty: i64,
    #[serde(default)]
    pub avg_entry_price: Option<f64>,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub cross_margin: Option<bool>,
    #[serde(default)]
    pub liquidation_price: Option<f64>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.current_qty != 0
    }
}

/// Order as reported by the exchange
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "clOrdID", default)]
    pub cl_ord_id: Option<String>,
    pub symbol: String,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub order_qty: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub ord_type: Option<String>,
    #[serde(default)]
    pub ord_status: Option<String>,
}

/// Contract specification from `/instrument`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub mark_price: Option<f64>,
    #[serde(default)]
    pub tick_size: Option<f64>,
    #[serde(default)]
    pub lot_size: Option<f64>,
}

/// Leverage setting for a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leverage {
    Cross,
    Isolated(f64),
}

impl Leverage {
    /// Wire value: 0 selects cross margin
    pub fn as_wire(&self) -> f64 {
        match self {
            Leverage::Cross => 0.0,
            Leverage::Isolated(multiple) => *multiple,
        }
    }
}

impl From<f64> for Leverage {
    fn from(value: f64) -> Self {
        if value <= 0.0 {
            Leverage::Cross
        } else {
            Leverage::Isolated(value)
        }
    }
}
