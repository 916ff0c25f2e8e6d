//! Service-account token exchange.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  GraphqlClient (per request) │
//! └──────────────────────────────┘
//!              │ token()
//!              ↓
//! ┌──────────────────────────────┐
//! │  Authenticator               │
//! │  - cached Token              │
//! │  - refresh when expired      │
//! └──────────────────────────────┘
//!              │ POST {clientSecret}
//!              ↓
//!   <auth_endpoint><service_account_id>
//! ```
//!
//! One `Authenticator` is built per process and shared as an
//! `Arc<dyn TokenProvider>` by every stream. The cache lock is held across the
//! refresh request, so concurrent callers wait for the in-flight refresh and
//! observe its token instead of issuing their own.

use crate::config::TapConfig;
use crate::error::{Result, TapError};
use crate::retry::{send_with_retry, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};


/// Numeric expiries at or above this are epoch seconds; below it, a lifetime in seconds.
const EPOCH_SECONDS_THRESHOLD: i64 = 1_000_000_000;

/// Epoch values at or above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Bearer token plus its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// `None` means the token never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refreshed: DateTime<Utc>,
}

impl Token {
    /// A token is usable while `now < expires_at`, or forever without an expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Source of bearer tokens for data requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid token, refreshing it first if needed.
    async fn token(&self) -> Result<Token>;
}

/// Body posted to the auth endpoint.
#[derive(Serialize)]
struct AuthRequest<'a> {
    #[serde(rename = "clientSecret")]
    client_secret: &'a str,
}

/// Body returned by the auth endpoint.
#[derive(Deserialize, Debug)]
struct AuthResponse {
    #[serde(rename = "bearerToken")]
    bearer_token: String,
    #[serde(rename = "expiresOn", default)]
    expires_on: Option<Value>,
}

/// Caching client for the service-account auth endpoint.
pub struct Authenticator {
    http_client: reqwest::Client,
    auth_url: String,
    client_secret: String,
    timeout: Duration,
    retry: RetryPolicy,
    cache: Mutex<Option<Token>>,
}

impl Authenticator {
    pub fn new(config: &TapConfig) -> Self {
        Self::with_url(
            config.auth_url(),
            config.client_secret.clone(),
            config.auth_timeout(),
            config.auth_retry.clone(),
        )
    }

    /// Create an authenticator against an explicit URL (tests point this at a mock server).
    pub fn with_url(
        auth_url: String,
        client_secret: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            auth_url,
            client_secret,
            timeout,
            retry,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached token, refreshing it when absent or expired.
    pub async fn get_token(&self) -> Result<Token> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.clone());
            }
            debug!(expires_at = ?token.expires_at, "Cached token expired");
        }

        let token = self.refresh().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    /// Exchanges the client secret for a new bearer token.
    ///
    /// Non-success statuses fail immediately with the raw body; only transient
    /// failures covered by the retry policy are attempted again.
    async fn refresh(&self) -> Result<Token> {
        let request_time = Utc::now();
        let body = AuthRequest {
            client_secret: &self.client_secret,
        };

        info!(auth_url = %self.auth_url, "Requesting bearer token");

        let response = send_with_retry(&self.retry, &self.auth_url, || {
            self.http_client
                .post(&self.auth_url)
                .timeout(self.timeout)
                .json(&body)
        })
        .await
        .map_err(|e| TapError::AuthTransport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TapError::AuthTransport(e.to_string()))?;

        if !status.is_success() {
            return Err(TapError::Auth {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: AuthResponse = serde_json::from_str(&text)
            .map_err(|e| TapError::AuthResponse(format!("{}: {}", e, text)))?;

        let expires_at = parse_expiry(parsed.expires_on.as_ref(), request_time)?;
        if expires_at.is_none() {
            warn!("Auth response has no expiresOn; treating token as non-expiring");
        }

        info!(expires_at = ?expires_at, "OAuth authorization attempt was successful");

        Ok(Token {
            access_token: parsed.bearer_token,
            expires_at,
            last_refreshed: request_time,
        })
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn token(&self) -> Result<Token> {
        self.get_token().await
    }
}

/// Parses `expiresOn` relative to `issued_at`, the time the token was requested.
///
/// Numbers (or numeric strings) below 10^9 are a lifetime in seconds; larger
/// values are epoch seconds, or epoch milliseconds from 10^12 up. Other
/// strings must be RFC 3339. Absent and `null` both mean "never expires".
pub fn parse_expiry(
    value: Option<&Value>,
    issued_at: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(secs) => from_number(secs, issued_at).map(Some),
            None => n
                .as_f64()
                .filter(|f| f.is_finite())
                .ok_or_else(|| malformed_expiry(&n.to_string()))
                .and_then(|f| from_number(f as i64, issued_at))
                .map(Some),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<i64>() {
                return from_number(secs, issued_at).map(Some);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| malformed_expiry(s))
        }
        Some(other) => Err(malformed_expiry(&other.to_string())),
    }
}

fn from_number(n: i64, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let parsed = if n < 0 {
        None
    } else if n >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(n).single()
    } else if n >= EPOCH_SECONDS_THRESHOLD {
        Utc.timestamp_opt(n, 0).single()
    } else {
        issued_at.checked_add_signed(chrono::Duration::seconds(n))
    };
    parsed.ok_or_else(|| malformed_expiry(&n.to_string()))
}

fn malformed_expiry(raw: &str) -> TapError {
    TapError::AuthResponse(format!("unrecognised expiresOn value '{}'", raw))
}
