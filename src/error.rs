// src/error.rs
//! Error kinds surfaced by the briefing pipeline.

/// Everything a single brief run can fail with. Nothing here is retried;
/// the caller decides what a failure means for the invocation.
#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error("RSS fetch failed: {status}")]
    Fetch { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("AI error {status}: {body}")]
    Analysis { status: u16, body: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BriefError>;
