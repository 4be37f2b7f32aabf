use super::error::{ExchangeError, ExchangeResult};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Seconds a signed request stays valid
pub const EXPIRY_WINDOW_SECS: i64 = 5;

/// API credentials for one BitMEX account
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(base_url: String, api_key: String, api_secret: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }
}

// Keep the secret out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// HEX(HMAC_SHA256(secret, verb + path + expires + body))
///
/// `path` is the full request path including `/api/v1` and any query string.
pub fn signature(
    secret: &str,
    verb: &str,
    path: &str,
    expires: i64,
    body: &str,
) -> ExchangeResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signature(format!("HMAC init failed: {}", e)))?;
    mac.update(verb.as_bytes());
    mac.update(path.as_bytes());
    mac.update(expires.to_string().as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Unix timestamp `EXPIRY_WINDOW_SECS` from now
pub fn expiry_from_now() -> i64 {
    Utc::now().timestamp() + EXPIRY_WINDOW_SECS
}

/// Build the authentication headers for one request
pub fn auth_headers(
    credentials: &Credentials,
    verb: &str,
    path: &str,
    expires: i64,
    body: &str,
) -> ExchangeResult<HeaderMap> {
    let signature = signature(&credentials.api_secret, verb, path, expires, body)?;

    tracing::debug!(verb, path, expires, "Signing request");

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert("api-expires", HeaderValue::from_str(&expires.to_string())?);
    headers.insert("api-key", HeaderValue::from_str(&credentials.api_key)?);
    headers.insert("api-signature", HeaderValue::from_str(&signature)?);

    Ok(headers)
}
