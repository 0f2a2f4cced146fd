//! Errors raised while talking to the exam data source.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("Invalid backend URL: {0}")]
    Url(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid exam JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No exam source configured (set EXAMCAL_API_URL or EXAMCAL_EXAMS_FILE)")]
    NoSource,
}

pub type SourceResult<T> = Result<T, SourceError>;
