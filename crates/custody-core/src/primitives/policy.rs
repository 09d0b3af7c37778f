use serde::{Deserialize, Serialize};
use std::fmt;

/// Share counts never grow past this, however large the custodian pool.
pub const MAX_RECOMMENDED_SHARES: usize = 15;

/// The (N, T) pair recommended for a custodian pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub total_shares: usize,
    pub threshold: usize,
    pub reason: AllocationReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationReason {
    /// Fewer than 3 custodians
    Minimum,
    /// 3 to 5 custodians
    SmallPool,
    /// 6 to 10 custodians
    MediumPool,
    /// More than 10 custodians
    LargePool,
}

impl fmt::Display for AllocationReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AllocationReason::Minimum => "minimum configuration due to limited custodians",
            AllocationReason::SmallPool => "small custodian pool configuration",
            AllocationReason::MediumPool => "medium custodian pool configuration",
            AllocationReason::LargePool => "large custodian pool configuration",
        };
        f.write_str(s)
    }
}

// ceil(n * num / den)
fn ceil_ratio(n: usize, num: usize, den: usize) -> usize {
    (n * num + den - 1) / den
}

/// Recommends how many shares to create and how many are needed to
/// reconstruct, given the number of custodians able to hold a share.
///
/// Small pools keep one custodian spare, medium pools use 70% of the
/// custodians, large pools half of them capped at 15. The threshold is half
/// the shares for small pools and 60% otherwise, never below 2.
pub fn compute_optimal(available: usize) -> Allocation {
    let (total_shares, threshold, reason) = match available {
        0..=2 => (2, 2, AllocationReason::Minimum),
        3..=5 => {
            let n = available - 1;
            (n, ceil_ratio(n, 1, 2), AllocationReason::SmallPool)
        }
        6..=10 => {
            let n = available * 7 / 10;
            (n, ceil_ratio(n, 6, 10), AllocationReason::MediumPool)
        }
        _ => {
            let n = std::cmp::min(MAX_RECOMMENDED_SHARES, available / 2);
            (n, ceil_ratio(n, 6, 10), AllocationReason::LargePool)
        }
    };

    Allocation {
        total_shares,
        threshold: threshold.max(threshold_sss::MIN_THRESHOLD),
        reason,
    }
}
