pub mod actions;
pub mod opts;

use thiserror::Error;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),
    #[error("{0}")]
    CustodyError(#[from] custody_core::primitives::CustodyError),
    #[error("{0}")]
    StoreError(#[from] custody_core::primitives::StoreError),
    #[error("invalid secret id {0:?}")]
    InvalidSecretId(String),
    #[error("input ended before the submission was complete")]
    Abandoned,
}
