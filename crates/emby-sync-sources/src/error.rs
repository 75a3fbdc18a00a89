use thiserror::Error;

/// Failure to obtain a catalog from an upstream feed.
///
/// The importer skips the affected source id for the run; no partial list is used.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream {source_id} unavailable: {reason}")]
    UpstreamUnavailable { source_id: String, reason: String },
}

impl SourceError {
    pub fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::UpstreamUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from talking to the media server.
#[derive(Debug, Error)]
pub enum EmbyError {
    /// Retries exhausted. `storage_fault` is set when the last failure was the
    /// server's database contention error.
    #[error("request to {url} failed after {attempts} attempts: {last_error}")]
    Transient {
        url: String,
        attempts: u32,
        storage_fault: bool,
        last_error: String,
    },

    /// The server answered but the payload was not what we expected.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EmbyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbyError::Transient { .. })
    }
}
