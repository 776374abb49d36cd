use reqwest::StatusCode;
use serde_json::Value;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the attach workflow.
///
/// Authentication is fatal and aborts the run; every other variant is
/// row-scoped and contained by the batch driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{kind} '{key}' not found on controller")]
    NotFound { kind: &'static str, key: String },

    #[error("{context} returned status {status}: {body}")]
    Request {
        context: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("device input missing required variable '{0}'")]
    Validation(String),

    #[error("device action {process_id} failed: {status}")]
    ActionFailed { process_id: String, status: Value },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("roster error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
