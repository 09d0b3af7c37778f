/// Records of secrets and custodians
pub(crate) mod types;
pub use types::*;

/// Adaptive choice of share count and threshold from the custodian pool size
pub mod policy;
pub use policy::{compute_optimal, Allocation, AllocationReason};

mod errors;
pub use errors::{CustodyError, CustodyResult, StoreError, StoreResult};
