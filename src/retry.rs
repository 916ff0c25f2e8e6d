//! Retry policy for transient HTTP failures.
//!
//! Only connection errors, timeouts and 500/502/503/504 responses count as
//! transient. Every other status is handed back to the caller on the first
//! attempt so it can be reported with its body.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

/// Returns true for statuses worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Sends the request built by `build`, retrying transient failures per `policy`.
///
/// When retries are exhausted on a transient status the last response is
/// returned as-is, so the caller still sees the status and body.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    target: &str,
    mut build: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let more = attempt < max_attempts;
        match build().send().await {
            Ok(response) if more && is_transient_status(response.status()) => {
                warn!(
                    target_url = %target,
                    attempt,
                    max_attempts,
                    status = %response.status(),
                    "Transient HTTP status, will retry"
                );
            }
            Ok(response) => return Ok(response),
            Err(e) if more && (e.is_connect() || e.is_timeout()) => {
                warn!(
                    target_url = %target,
                    attempt,
                    max_attempts,
                    error = %e,
                    "HTTP request failed, will retry"
                );
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(policy.delay_after(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::NOT_IMPLEMENTED));
    }

    #[tokio::test]
    async fn test_retries_transient_until_exhausted() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/flaky")
            .with_status(503)
            .with_body("try later")
            .expect(3)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/flaky", server.url());
        let response = send_with_retry(&fast_policy(3), &url, || client.post(&url))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/denied")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/denied", server.url());
        let response = send_with_retry(&fast_policy(5), &url, || client.post(&url))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/once")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/once", server.url());
        let response = send_with_retry(&RetryPolicy::default(), &url, || client.post(&url))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        mock.assert_async().await;
    }
}
