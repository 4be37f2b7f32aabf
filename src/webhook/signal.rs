use crate::models::Side;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Alert payload posted by the charting tool
#[derive(Clone, Deserialize, Serialize, PartialEq)]
pub struct TradeSignal {
    /// Shared secret
    pub signature: String,
    pub strategy: String,
    pub instrument: String,
    pub side: Side,
    /// Price at alert time; informational only
    #[serde(default)]
    pub entry: Option<f64>,
}

impl fmt::Debug for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradeSignal")
            .field("strategy", &self.strategy)
            .field("instrument", &self.instrument)
            .field("side", &self.side)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalRejection {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unrecognized strategy '{0}'")]
    UnknownStrategy(String),
}

/// Admits only signals carrying the shared secret and our strategy id
#[derive(Clone)]
pub struct SignalGate {
    secret: String,
    strategy: String,
}

impl SignalGate {
    pub fn new(secret: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            strategy: strategy.into(),
        }
    }

    pub fn check(&self, signal: &TradeSignal) -> Result<(), SignalRejection> {
        if signal.signature != self.secret {
            return Err(SignalRejection::InvalidSignature);
        }

        if signal.strategy != self.strategy {
            return Err(SignalRejection::UnknownStrategy(signal.strategy.clone()));
        }

        Ok(())
    }
}
