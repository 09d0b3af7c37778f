//! # Custody Core
//!
//! Custody of secrets split with threshold secret sharing. An owner's secret
//! is split into `n` shares, any `t` of which reconstruct it, and each share
//! is handed to a different custodian.
//!
//! The share count and threshold are derived from the size of the custodian
//! pool (see [`primitives::policy`]). Shares are assigned as a single batch:
//! either every share finds a custodian, or none is assigned and the secret
//! stays pending. Only the owner of a secret may collect its shares back and
//! reconstruct it.

/// Backend trait and implementations for durably storing the records
pub mod backend;
pub use backend::{Collection, CollectionLock, JsonFile, MemoryCollection};

/// Tunables of the service
pub mod config;
pub use config::CustodyConfig;

/// Notifier trait and the outbox implementation
pub mod notifier;
pub use notifier::{Notifier, Outbox, OutboxMessage};

/// Records, errors and the share allocation policy
pub mod primitives;

mod registry;
pub use registry::CustodianRegistry;

mod store;
pub use store::{validate_parameters, SecretStore};

mod distribution;
pub use distribution::{DistributionCoordinator, DistributionReport};

mod reconstruction;
pub use reconstruction::ReconstructionCoordinator;

/// Step by step submission of a secret
pub mod session;
pub use session::{Session, SessionError, SessionState, Step, SubmitRequest};

mod service;
pub use service::{CustodyService, Submission};

#[cfg(test)]
mod test_helpers;
