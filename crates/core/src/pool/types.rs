//! Types for the pool module.

use serde::{Deserialize, Serialize};

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name (e.g., "acquisition", "finalization").
    pub name: String,
    /// Units currently running.
    pub active: usize,
    /// Highest number of units that ran at the same time.
    pub peak_active: usize,
    /// Maximum concurrent units.
    pub max_concurrent: usize,
    /// Submitters waiting for a slot.
    pub waiting: usize,
    /// Units accepted since creation.
    pub submitted: u64,
    /// Units that finished successfully.
    pub succeeded: u64,
    /// Units that finished with an error.
    pub failed: u64,
}

impl PoolStatus {
    /// Units that reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_settled() {
        let status = PoolStatus {
            name: "acquisition".to_string(),
            active: 1,
            peak_active: 3,
            max_concurrent: 3,
            waiting: 0,
            submitted: 10,
            succeeded: 7,
            failed: 2,
        };

        assert_eq!(status.settled(), 9);
        assert!(status.peak_active <= status.max_concurrent);
    }

    #[test]
    fn test_pool_status_serialization() {
        let status = PoolStatus {
            name: "finalization".to_string(),
            active: 0,
            peak_active: 2,
            max_concurrent: 2,
            waiting: 0,
            submitted: 4,
            succeeded: 4,
            failed: 0,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"name\":\"finalization\""));
        assert!(json.contains("\"peak_active\":2"));
    }
}
