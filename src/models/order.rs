use super::Side;
use serde::{Deserialize, Serialize, Serializer};

/// Order type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrdType {
    Limit,
    Market,
    Stop,
    StopLimit,
    MarketIfTouched,
    LimitIfTouched,
    Pegged,
}

/// Execution instruction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecInst {
    /// Post-only: never take liquidity
    ParticipateDoNotInitiate,
    AllOrNone,
    MarkPrice,
    IndexPrice,
    LastPrice,
    Close,
    ReduceOnly,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    GoodTillCancel,
    ImmediateOrCancel,
    FillOrKill,
}

/// Body of `POST /order`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_qty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_px: Option<f64>,
    pub ord_type: OrdType,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_exec_inst"
    )]
    pub exec_inst: Vec<ExecInst>,
    #[serde(rename = "clOrdID", skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_qty: Option<i64>,
}

// BitMEX takes execInst as one comma-separated string
fn serialize_exec_inst<S: Serializer>(insts: &[ExecInst], serializer: S) -> Result<S::Ok, S::Error> {
    let joined = insts
        .iter()
        .map(|inst| format!("{:?}", inst))
        .collect::<Vec<_>>()
        .join(",");
    serializer.serialize_str(&joined)
}

/// How caller-supplied exec instructions combine with the defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecInstMerge {
    /// Caller's list replaces the defaults (when non-empty)
    Replace,
    /// Caller's list is appended after the defaults
    Append,
}

impl OrderRequest {
    fn base(symbol: &str, ord_type: OrdType) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: None,
            order_qty: None,
            price: None,
            stop_px: None,
            ord_type,
            exec_inst: Vec::new(),
            cl_ord_id: None,
            text: None,
            time_in_force: None,
            display_qty: None,
        }
    }

    pub fn limit(symbol: &str, quantity: i64, price: f64, side: Side) -> Self {
        Self {
            side: Some(side),
            order_qty: Some(quantity),
            price: Some(price),
            ..Self::base(symbol, OrdType::Limit)
        }
    }

    pub fn post_only(symbol: &str, quantity: i64, price: f64, side: Side) -> Self {
        Self {
            exec_inst: vec![ExecInst::ParticipateDoNotInitiate],
            ..Self::limit(symbol, quantity, price, side)
        }
    }

    pub fn market(symbol: &str, side: Side, quantity: i64) -> Self {
        Self {
            side: Some(side),
            order_qty: Some(quantity),
            ..Self::base(symbol, OrdType::Market)
        }
    }

    /// Stop market order that only ever closes
    pub fn stop(symbol: &str, stop_px: f64, side: Side) -> Self {
        Self {
            side: Some(side),
            stop_px: Some(stop_px),
            exec_inst: vec![ExecInst::Close],
            ..Self::base(symbol, OrdType::Stop)
        }
    }

    /// Market order offsetting a position of `current_qty` contracts.
    ///
    /// No side is sent; the sign of the quantity picks it.
    pub fn close(symbol: &str, current_qty: i64) -> Self {
        Self {
            order_qty: Some(-current_qty),
            exec_inst: vec![ExecInst::Close],
            ..Self::base(symbol, OrdType::Market)
        }
    }

    /// Apply caller overrides on top of this request
    pub fn with_options(mut self, options: &OrderOptions, merge: ExecInstMerge) -> Self {
        match merge {
            ExecInstMerge::Replace => {
                if !options.exec_inst.is_empty() {
                    self.exec_inst = options.exec_inst.clone();
                }
            }
            ExecInstMerge::Append => {
                for inst in &options.exec_inst {
                    if !self.exec_inst.contains(inst) {
                        self.exec_inst.push(*inst);
                    }
                }
            }
        }

        if let Some(ord_type) = options.ord_type {
            self.ord_type = ord_type;
        }
        if let Some(side) = options.side {
            self.side = Some(side);
        }
        if let Some(qty) = options.order_qty {
            self.order_qty = Some(qty);
        }
        if let Some(price) = options.price {
            self.price = Some(price);
        }
        if let Some(stop_px) = options.stop_px {
            self.stop_px = Some(stop_px);
        }
        if let Some(ref id) = options.cl_ord_id {
            self.cl_ord_id = Some(id.clone());
        }
        if let Some(ref text) = options.text {
            self.text = Some(text.clone());
        }
        if let Some(tif) = options.time_in_force {
            self.time_in_force = Some(tif);
        }
        if let Some(display_qty) = options.display_qty {
            self.display_qty = Some(display_qty);
        }

        self
    }
}

/// Named overrides for order placement
///
/// Unknown keys are rejected on deserialize.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderOptions {
    pub ord_type: Option<OrdType>,
    #[serde(default)]
    pub exec_inst: Vec<ExecInst>,
    pub side: Option<Side>,
    pub order_qty: Option<i64>,
    pub price: Option<f64>,
    pub stop_px: Option<f64>,
    #[serde(rename = "clOrdID")]
    pub cl_ord_id: Option<String>,
    pub text: Option<String>,
    pub time_in_force: Option<TimeInForce>,
    pub display_qty: Option<i64>,
}

/// Extra fields for cancel requests
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CancelOptions {
    /// Annotation stored with the cancellation
    pub text: Option<String>,
    /// Extra order filter, only honoured by cancel-all
    pub filter: Option<serde_json::Value>,
}

/// Extra fields for `POST /position/leverage`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeverageOptions {
    pub target_account_id: Option<i64>,
}

/// Identifies a single order to cancel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderId {
    /// Client-assigned `clOrdID`
    Client(String),
    /// Exchange-assigned `orderID`
    Exchange(String),
}

impl OrderId {
    /// Prefer the client id when both are known
    pub fn resolve(cl_ord_id: Option<&str>, order_id: Option<&str>) -> Option<Self> {
        match (cl_ord_id, order_id) {
            (Some(cl), _) if !cl.is_empty() => Some(OrderId::Client(cl.to_string())),
            (_, Some(id)) if !id.is_empty() => Some(OrderId::Exchange(id.to_string())),
            _ => None,
        }
    }
}
