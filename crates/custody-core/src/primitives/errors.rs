use super::types::{SecretId, SecretStatus, UserId};
use thiserror::Error;
use threshold_sss::SharingError;

/// Result type alias which returns `CustodyError`
pub type CustodyResult<A> = Result<A, CustodyError>;

/// Result type alias which returns `StoreError`
pub type StoreResult<A> = Result<A, StoreError>;

#[derive(Debug, Error)]
/// Errors which may occur while sharing, distributing or reconstructing a secret
pub enum CustodyError {
    /// Validation is raised when the input of an operation is rejected before
    /// anything is done with it, e.g. an empty secret or an invalid threshold.
    #[error("invalid input: {0}")]
    Validation(String),

    /// SecretNotFound is raised when no secret with the given id exists.
    #[error("secret {0} was not found")]
    SecretNotFound(SecretId),

    /// CustodianNotFound is raised when no custodian with the given id exists.
    #[error("custodian {0} is not registered")]
    CustodianNotFound(UserId),

    /// Unauthorized is raised when someone other than the owner of a secret
    /// tries to access it.
    #[error("user {requester} is not the owner of secret {secret_id}")]
    Unauthorized { secret_id: SecretId, requester: UserId },

    /// InsufficientCustodians is raised when there are not enough eligible
    /// custodians to hold every share of a secret. Nothing was assigned.
    #[error("not enough custodians available: need {required}, only {available} eligible")]
    InsufficientCustodians { available: usize, required: usize },

    /// InsufficientShares is raised when fewer shares than the threshold of
    /// a secret could be collected.
    #[error("not enough shares available: need {required}, only found {found}")]
    InsufficientShares { found: usize, required: usize },

    /// AlreadyRegistered is raised when registering a custodian twice.
    #[error("user {0} is already registered as a custodian")]
    AlreadyRegistered(UserId),

    /// AlreadyAssigned is raised when a custodian would receive a second
    /// share of the same secret.
    #[error("custodian {custodian} already holds a share of secret {secret_id}")]
    AlreadyAssigned { custodian: UserId, secret_id: SecretId },

    /// InvalidTransition is raised when a status update is not allowed by
    /// the secret lifecycle.
    #[error("secret {secret_id} cannot go from {from} to {to}")]
    InvalidTransition {
        secret_id: SecretId,
        from: SecretStatus,
        to: SecretStatus,
    },

    /// Reconstruction is raised when the shares cannot be combined.
    #[error("could not reconstruct the secret: {0}")]
    Reconstruction(#[source] SharingError),

    /// NoRuntime is raised when shares would be distributed without a tokio
    /// runtime to deliver the notifications on. Nothing was changed.
    #[error("no tokio runtime is available to deliver notifications")]
    NoRuntime,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CustodyError {
    /// Whether the failure was caused by the caller's input, as opposed to
    /// the state of the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, CustodyError::Validation(_))
    }
}

#[derive(Debug, Error)]
/// Errors raised by the durable store
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not (de)serialize records: {0}")]
    Json(#[from] serde_json::Error),

    /// A thread panicked while holding the lock on a collection
    #[error("the {0} collection lock is poisoned")]
    Poisoned(&'static str),
}
