//! Pool lookup trait and usage statistics.
//!
//! Both the shared [`IovPool`](super::IovPool) and the per-session
//! [`SessionPool`](super::SessionPool) answer the same two questions: what
//! window do you cover, and do you hold a value for this key.

use condor_core::{Iov, Key, Value};

/// Read access to a set of values sharing one window.
///
/// A miss is a normal `None`, not an error; callers branch on it.
pub trait ValueSource {
    /// Look up a value by key.
    fn lookup(&self, key: Key) -> Option<Value>;

    /// The window shared by every member.
    fn validity(&self) -> &Iov;

    /// Check for a key without cloning the value.
    fn contains(&self, key: Key) -> bool {
        self.lookup(key).is_some()
    }
}

/// Lookup counters for one resolution session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Keys answered from the session pool.
    pub session_hits: u64,
    /// Keys copied in from the shared IOV pool.
    pub iov_hits: u64,
    /// Derived values computed by a callback.
    pub callbacks: u64,
}

impl PoolStats {
    /// Total number of keys served.
    pub fn requests(&self) -> u64 {
        self.session_hits + self.iov_hits + self.callbacks
    }

    /// Fraction of requests answered from the session pool (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.session_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_stats_hit_rate() {
        let stats = PoolStats {
            session_hits: 6,
            iov_hits: 2,
            callbacks: 2,
        };
        assert_eq!(stats.requests(), 10);
        assert!((stats.hit_rate() - 0.6).abs() < 0.001);

        let empty_stats = PoolStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
