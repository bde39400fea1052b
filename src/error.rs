//! Error types for remote job execution.

use crate::job::JobState;
use std::time::Duration;

/// Maximum length of a provider message kept in an error.
const MAX_MESSAGE_LEN: usize = 500;

/// Errors that can occur while submitting, polling or fetching a job.
#[derive(Debug, thiserror::Error)]
pub enum GenJobError {
    /// API key missing or empty.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Client configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Request rejected locally before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider did not accept the job or returned no task id.
    #[error("submission failed: {0}")]
    Submission(String),

    /// A status poll failed in transport; polling may continue.
    #[error("transient poll failure: {0}")]
    TransientPoll(String),

    /// The provider answered with a body we cannot interpret.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// A management call (listing or deleting tasks) was rejected.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized provider message.
        message: String,
    },

    /// Network or HTTP error outside the poll loop.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider reported the job as failed or canceled.
    #[error("job {state}: {message}")]
    JobFailed {
        /// Terminal state, failed or canceled.
        state: JobState,
        /// Provider reason, sanitized.
        message: String,
    },

    /// The job was still pending when the wait budget ran out.
    #[error("job {task_id} still pending after {waited:?}")]
    Timeout {
        /// Id to resume polling with.
        task_id: String,
        /// Time spent waiting.
        waited: Duration,
    },

    /// The artifact could not be downloaded. The URL stays valid for a manual retry.
    #[error("download of {url} failed: {message}")]
    Download {
        /// Artifact URL.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// I/O error (e.g., writing the artifact or a manifest).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenJobError {
    /// Returns true if the error is worth another poll within the wait budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientPoll(_))
    }

    /// Returns the task id associated with the error, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Timeout { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

/// Result type alias for job operations.
pub type Result<T> = std::result::Result<T, GenJobError>;

/// Trims a provider error body and masks anything that looks like a bearer key.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let masked: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
            if bare.starts_with("sk-") && bare.len() > 8 {
                word.replace(bare, "sk-***")
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = masked.join(" ");

    if joined.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        joined
    }
}
