use capitol_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
}
