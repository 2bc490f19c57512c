//! Connection diagnostics counters
//!
//! Counts tenant pool opens, reuses, evictions and connect failures. The
//! counters sit behind a mutex and are read as a [`ConnectionStats`]
//! snapshot for `/health`.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Snapshot of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Tenant database pools opened
    pub pools_created: u64,
    /// Requests served by an already open pool
    pub pools_reused: u64,
    /// Failed attempts to open a tenant database
    pub connect_failures: u64,
    /// Pools dropped from the cache
    pub pools_evicted: u64,
}

/// Lock-protected connection event counters shared across requests
#[derive(Debug, Default)]
pub struct ConnectionDiagnostics {
    stats: Mutex<ConnectionStats>,
}

impl ConnectionDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut ConnectionStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    pub fn record_created(&self) {
        self.update(|s| s.pools_created += 1);
    }

    pub fn record_reused(&self) {
        self.update(|s| s.pools_reused += 1);
    }

    pub fn record_failure(&self) {
        self.update(|s| s.connect_failures += 1);
    }

    pub fn record_eviction(&self) {
        self.update(|s| s.pools_evicted += 1);
    }

    pub fn snapshot(&self) -> ConnectionStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let diagnostics = ConnectionDiagnostics::new();
        diagnostics.record_created();
        diagnostics.record_reused();
        diagnostics.record_reused();
        diagnostics.record_failure();

        let stats = diagnostics.snapshot();
        assert_eq!(stats.pools_created, 1);
        assert_eq!(stats.pools_reused, 2);
        assert_eq!(stats.connect_failures, 1);
        assert_eq!(stats.pools_evicted, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let diagnostics = Arc::new(ConnectionDiagnostics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = Arc::clone(&diagnostics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        d.record_reused();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(diagnostics.snapshot().pools_reused, 800);
    }
}
