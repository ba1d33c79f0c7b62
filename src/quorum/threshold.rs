//! Fault tolerance and claim threshold for a watchtower committee.

use serde::Serialize;

use crate::error::{BenchError, BenchResult};

/// Quorum parameters derived from the committee size.
///
/// With `n` watchtowers the committee tolerates `f = floor((n - 1) / 3)`
/// faulty members, and a pessimistic close needs `t = min(2f + 1, n)`
/// watchtower claims before it can be finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuorumParams {
    /// Number of watchtowers (`n`).
    pub committee_size: usize,
    /// Maximum tolerated faulty watchtowers (`f`).
    pub fault_tolerance: usize,
    /// Minimum claims required to finalize (`t`).
    pub threshold: usize,
}

impl QuorumParams {
    /// Derives `f` and `t` for a committee of `n` watchtowers.
    pub fn for_committee(n: usize) -> BenchResult<Self> {
        if n < 1 {
            return Err(BenchError::InvalidParameter(format!(
                "committee size must be at least 1, got {}",
                n
            )));
        }
        let fault_tolerance = (n - 1) / 3;
        let threshold = (2 * fault_tolerance + 1).min(n);
        Ok(Self {
            committee_size: n,
            fault_tolerance,
            threshold,
        })
    }

    /// Number of claims submitted in a pessimistic virtual close: one full
    /// quorum per channel party.
    pub fn virtual_claims(&self) -> usize {
        2 * self.threshold
    }
}
