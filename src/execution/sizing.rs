use serde::Deserialize;

/// Fraction of the computed size actually sent, leaving room for fees and slippage
pub const SAFETY_HAIRCUT: f64 = 0.9;

/// Position sizing parameters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SizingParams {
    /// Converts exchange balance units to the base currency (XBt -> XBT)
    pub balance_scale: f64,
    /// Fraction of the available balance to commit per entry
    pub percent_of_balance: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            balance_scale: 1e-8,     // satoshi -> XBT
            percent_of_balance: 0.5, // half the available margin
        }
    }
}

/// Number of 1 USD contracts to enter with
///
/// `floor(price × margin × balance_scale × percent_of_balance × 0.9)`
pub fn position_size(reference_price: f64, available_margin: i64, params: &SizingParams) -> i64 {
    // Balance in XBT
    let balance = available_margin as f64 * params.balance_scale;

    // XBT × USD/XBT gives roughly the number of 1 USD contracts
    let raw_quantity = reference_price * balance;

    (raw_quantity * params.percent_of_balance * SAFETY_HAIRCUT).floor() as i64
}
