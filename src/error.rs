//! Error types for the sync engine.

use thiserror::Error;

/// Failure of a single HTTP operation against the media server, after the
/// retry policy has run its course.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The server rejected the API key. Never retried.
    #[error("authentication rejected (status {status})")]
    Unauthorized { status: u16 },

    /// Non-success status outside the retriable classes.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection-level failure (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The retry budget ran out on a transient failure.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<RequestError> },
}

impl RequestError {
    /// Transient conditions worth another attempt: connection trouble,
    /// 5xx responses and rate limiting.
    pub fn is_retriable(&self) -> bool {
        match self {
            RequestError::Transport(_) => true,
            RequestError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RequestError::Unauthorized { .. })
    }
}

/// Engine-level errors. Non-fatal kinds are recorded in the affected
/// holiday's outcome and the run continues; fatal kinds stop the run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A holiday rule cannot produce a date (bad ordinal, impossible
    /// month/day). Skips the holiday.
    #[error("invalid rule for {holiday}: {reason}")]
    InvalidRule { holiday: String, reason: String },

    /// Asset search for one window failed; remaining windows still run.
    #[error("search failed for {holiday} {year}: {source}")]
    SearchFailed {
        holiday: String,
        year: i32,
        source: RequestError,
    },

    /// Credential rejected. Halts the entire run.
    #[error("authentication rejected by server")]
    Authentication,

    /// Album lookup/creation/add failed for one holiday.
    #[error("album {operation} failed for {holiday}: {source}")]
    AlbumOperation {
        holiday: String,
        operation: &'static str,
        source: RequestError,
    },
}

impl SyncError {
    /// Fatal errors stop the whole run instead of being recorded against a
    /// single holiday.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Authentication)
    }
}
