use thiserror::Error;

#[derive(Error, Debug)]
pub enum DealscoutError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("Budget denied: {0}")]
    BudgetDenied(String),

    #[error("Deadline exceeded after {0}s")]
    DeadlineExceeded(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
