use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// API statuses treated as a successful response. Everything else is an
/// error even when the HTTP layer reports 200.
const ACCEPTED_STATUSES: &[&str] = &["OK", "ZERO_RESULTS"];

/// Issues single GET requests against the places API, normalizing transport,
/// HTTP and API-level failures, and gating every call on the daily quota.
pub struct RequestExecutor {
    http: reqwest::Client,
    attempts: AtomicU64,
    max_requests_per_day: u64,
}

impl RequestExecutor {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            // Matches the original tool; see AppConfig::tls_no_verify.
            .danger_accept_invalid_certs(config.tls_no_verify)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()
            .map_err(|err| AppError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            attempts: AtomicU64::new(0),
            max_requests_per_day: config.max_requests_per_day,
        })
    }

    /// Attempts made so far, successful or not.
    pub fn requests_made(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn execute(&self, url: &str) -> AppResult<Value> {
        if self.attempts.load(Ordering::SeqCst) >= self.max_requests_per_day {
            return Err(AppError::QuotaExceeded);
        }
        // Counts attempts, not successes.
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;

        if status.as_u16() != 200 {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = serde_json::from_str(&body)?;

        if let Some(api_status) = parsed.get("status").and_then(Value::as_str) {
            if !ACCEPTED_STATUSES.contains(&api_status) {
                let message = parsed
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(AppError::ApiStatus {
                    status: api_status.to_string(),
                    message,
                });
            }
        }

        Ok(parsed)
    }
}
