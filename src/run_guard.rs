// =============================================================================
// Run Guard — at most one in-flight run per (symbol, horizon)
// =============================================================================
//
// `try_acquire` registers a key and hands back a permit. The key is released
// when the permit is dropped, whether the run finished or was abandoned, so
// an aborted run never blocks the next one.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: impl Into<String>) -> Result<RunPermit, PipelineError> {
        let key = key.into();
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(key.clone()) {
            return Err(PipelineError::RunInFlight { key });
        }
        Ok(RunPermit {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains(key)
    }
}

/// Held for the duration of one run.
#[derive(Debug)]
pub struct RunPermit {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl RunPermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_key_fails() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire("BTC/USDT@4h").unwrap();
        assert_eq!(permit.key(), "BTC/USDT@4h");
        assert_eq!(
            guard.try_acquire("BTC/USDT@4h").unwrap_err(),
            PipelineError::RunInFlight {
                key: "BTC/USDT@4h".into()
            }
        );
        // Other keys are independent.
        assert!(guard.try_acquire("ETH/USDT@4h").is_ok());
    }

    #[test]
    fn drop_releases_key() {
        let guard = RunGuard::new();
        {
            let _permit = guard.try_acquire("k").unwrap();
            assert!(guard.is_in_flight("k"));
        }
        assert!(!guard.is_in_flight("k"));
        assert!(guard.try_acquire("k").is_ok());
    }

    #[test]
    fn clones_share_state() {
        let guard = RunGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire("k").unwrap();
        assert!(other.try_acquire("k").is_err());
    }
}
