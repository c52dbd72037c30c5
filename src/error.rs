use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Analysis service unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Analysis quota exhausted: {0}")]
    AnalysisQuota(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Feed refresh failed: {0}")]
    FeedRefresh(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Quota exhaustion is surfaced to the user as "try again later" and is
    /// never retried automatically, unlike transient analysis failures.
    pub fn is_quota(&self) -> bool {
        matches!(self, AppError::AnalysisQuota(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
