use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Custodians holding this many shares stop receiving new ones.
pub const DEFAULT_CAPACITY: usize = 100;

/// Dummy custodians created for testing get ids starting here.
pub const DEFAULT_DUMMY_ID_BASE: u64 = 1_000_000;

/// Tunables of the custody service. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CustodyConfig {
    /// Maximum number of shares a custodian may hold
    pub capacity: usize,
    /// Upper bound for delivering one notification, in milliseconds
    pub notify_timeout_ms: u64,
    /// First id used for dummy custodians; every id at or above it is
    /// considered a dummy by the bulk clear
    pub dummy_id_base: u64,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            notify_timeout_ms: 5_000,
            dummy_id_base: DEFAULT_DUMMY_ID_BASE,
        }
    }
}

impl CustodyConfig {
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}
