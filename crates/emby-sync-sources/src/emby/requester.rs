use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::EmbyError;

/// Body text Emby returns when its SQLite store is locked by another writer.
pub const STORAGE_FAULT_MARKER: &str = "SQLitePCL.pretty.SQLiteException";

/// Characters of an error body kept for logs.
const ERROR_BODY_PREVIEW: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): 2s, 4s, 8s...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exp)
    }
}

/// How a non-success response should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Database contention on the server; always worth retrying.
    StorageFault,
    /// Any other non-2xx answer.
    Status,
}

pub fn classify_failure(status: StatusCode, body: &str) -> FailureKind {
    if status == StatusCode::INTERNAL_SERVER_ERROR && body.contains(STORAGE_FAULT_MARKER) {
        FailureKind::StorageFault
    } else {
        FailureKind::Status
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Raw { content_type: &'static str, bytes: Vec<u8> },
}

/// The one place media-server requests are sent from.
///
/// Every call gets the same bounded retry with exponential backoff. After the
/// last attempt the caller gets `EmbyError::Transient`, never a failed response.
#[derive(Clone)]
pub struct RetryableRequester {
    client: Client,
    policy: RetryPolicy,
}

impl RetryableRequester {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn execute(&self, method: Method, url: &str, body: Option<&RequestBody>) -> Result<Response, EmbyError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();
        let mut storage_fault = false;

        for attempt in 1..=max_attempts {
            debug!(%method, url, attempt, "Sending request");
            let mut request = self.client.request(method.clone(), url);
            match body {
                Some(RequestBody::Json(value)) => request = request.json(value),
                Some(RequestBody::Raw { content_type, bytes }) => {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, *content_type)
                        .body(bytes.clone());
                }
                None => {}
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url, status = %response.status(), attempt, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
                    storage_fault = classify_failure(status, &text) == FailureKind::StorageFault;
                    if storage_fault {
                        warn!(url, attempt, max_attempts, "Emby storage contention, will retry");
                    } else {
                        warn!(url, attempt, max_attempts, status = %status, body = %preview, "Emby request failed");
                    }
                    last_error = format!("HTTP {}: {}", status, preview);
                }
                Err(e) => {
                    storage_fault = false;
                    warn!(url, attempt, max_attempts, error = %e, "Emby request error");
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff_for(attempt)).await;
            }
        }

        error!(url, attempts = max_attempts, storage_fault, error = %last_error, "Giving up on request");
        Err(EmbyError::Transient {
            url: url.to_string(),
            attempts: max_attempts,
            storage_fault,
            last_error,
        })
    }
}
