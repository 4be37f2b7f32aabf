use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Fallback when the error body is JSON with an `error` object but no message
pub const UNKNOWN_STATUS_MESSAGE: &str = "Unknown BitMEX API error status";
/// Fallback when the error body is JSON without an `error` object
pub const UNKNOWN_API_MESSAGE: &str = "Unknown BitMEX API error";

/// Minimum wait the exchange asks for after a load-shedding 503
pub const OVERLOAD_RETRY_AFTER: Duration = Duration::from_millis(500);

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Exchange answered with a non-success status
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    /// Response body was not JSON
    #[error("Unknown error (not a JSON response)")]
    UnparsableResponse { status: StatusCode },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request signing failed: {0}")]
    Signature(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ExchangeError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ExchangeError::Api { status, .. } | ExchangeError::UnparsableResponse { status } => {
                Some(*status)
            }
            ExchangeError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Load-shedding rejection; the request never reached the engine
    ///
    /// Callers that retry should wait at least [`OVERLOAD_RETRY_AFTER`].
    pub fn is_overloaded(&self) -> bool {
        self.status() == Some(StatusCode::SERVICE_UNAVAILABLE)
    }
}
