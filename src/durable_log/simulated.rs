//! Simulated log with seeded fault injection.
//!
//! Given the same seed and the same sequence of appends, the same appends
//! fail. Failed values are recorded so tests can check the log against the
//! expected first-occurrence sequence minus exactly those values.

use super::{LogError, LogWriter};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Fault probabilities for `SimulatedLog`
#[derive(Debug, Clone)]
pub struct SimulatedLogConfig {
    /// Probability that a single append fails
    pub write_fail_prob: f64,
    /// Fail the final close
    pub fail_close: bool,
}

impl Default for SimulatedLogConfig {
    fn default() -> Self {
        SimulatedLogConfig {
            write_fail_prob: 0.05,
            fail_close: false,
        }
    }
}

impl SimulatedLogConfig {
    pub fn no_faults() -> Self {
        SimulatedLogConfig {
            write_fail_prob: 0.0,
            fail_close: false,
        }
    }
}

struct SimulatedLogInner {
    rng: ChaCha8Rng,
    entries: Vec<u64>,
    failed: Vec<u64>,
    closed: bool,
}

#[derive(Clone)]
pub struct SimulatedLog {
    inner: Arc<Mutex<SimulatedLogInner>>,
    config: SimulatedLogConfig,
}

impl SimulatedLog {
    pub fn new(seed: u64, config: SimulatedLogConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.write_fail_prob),
            "Precondition: write_fail_prob must be a probability"
        );
        SimulatedLog {
            inner: Arc::new(Mutex::new(SimulatedLogInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                entries: Vec::new(),
                failed: Vec::new(),
                closed: false,
            })),
            config,
        }
    }

    /// Values that reached the log
    pub fn entries(&self) -> Vec<u64> {
        self.inner.lock().entries.clone()
    }

    /// Values whose append was failed by injection
    pub fn failed(&self) -> Vec<u64> {
        self.inner.lock().failed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl LogWriter for SimulatedLog {
    fn append(&mut self, value: u64) -> Result<(), LogError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(LogError::Closed);
        }
        if inner.rng.gen_bool(self.config.write_fail_prob) {
            inner.failed.push(value);
            return Err(LogError::Injected { value });
        }
        inner.entries.push(value);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.inner.lock().entries.len() as u64
    }

    fn close(self: Box<Self>) -> Result<(), LogError> {
        self.inner.lock().closed = true;
        if self.config.fail_close {
            return Err(LogError::Close {
                path: "simulated".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected close failure"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(seed: u64) -> (Vec<u64>, Vec<u64>) {
        let log = SimulatedLog::new(
            seed,
            SimulatedLogConfig {
                write_fail_prob: 0.3,
                fail_close: false,
            },
        );
        let mut writer = log.clone();
        for v in 0..200 {
            let _ = writer.append(v);
        }
        (log.entries(), log.failed())
    }

    #[test]
    fn test_same_seed_same_faults() {
        assert_eq!(run(42), run(42));
        assert_ne!(run(42).1, run(43).1);
    }

    #[test]
    fn test_entries_and_failures_partition_appends() {
        let (entries, failed) = run(7);
        assert!(!failed.is_empty());
        let mut all: Vec<u64> = entries.iter().chain(failed.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_close_failure_still_closes() {
        let log = SimulatedLog::new(
            1,
            SimulatedLogConfig {
                write_fail_prob: 0.0,
                fail_close: true,
            },
        );
        let writer = log.clone();
        assert!(Box::new(writer).close().is_err());
        assert!(log.is_closed());
    }
}
