//! Statistics Counter shared by the consume loop and the reporter.
//!
//! The counter itself is plain data; callers serialize on the
//! `parking_lot::Mutex` in `SharedCounter`. The consume loop holds that lock
//! for the whole per-value step, the reporter for read-then-reset.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Counts for one reporting window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistic {
    pub unique_count: u64,
    pub duplicate_count: u64,
    /// Out-of-domain values dropped before classification
    pub rejected_count: u64,
}

impl Statistic {
    /// Values classified as unique or duplicate
    pub fn processed(&self) -> u64 {
        self.unique_count.saturating_add(self.duplicate_count)
    }

    pub fn is_empty(&self) -> bool {
        *self == Statistic::default()
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} unique, {} duplicates",
            self.unique_count, self.duplicate_count
        )?;
        if self.rejected_count > 0 {
            write!(f, ", {} rejected", self.rejected_count)?;
        }
        Ok(())
    }
}

/// Resettable window plus never-reset lifetime totals
#[derive(Debug, Default)]
pub struct StatisticsCounter {
    window: Statistic,
    lifetime: Statistic,
}

impl StatisticsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_unique(&mut self) {
        self.window.unique_count = self.window.unique_count.saturating_add(1);
        self.lifetime.unique_count = self.lifetime.unique_count.saturating_add(1);
    }

    pub fn increment_duplicate(&mut self) {
        self.window.duplicate_count = self.window.duplicate_count.saturating_add(1);
        self.lifetime.duplicate_count = self.lifetime.duplicate_count.saturating_add(1);
    }

    pub fn increment_rejected(&mut self) {
        self.window.rejected_count = self.window.rejected_count.saturating_add(1);
        self.lifetime.rejected_count = self.lifetime.rejected_count.saturating_add(1);
    }

    /// Current window
    pub fn snapshot(&self) -> Statistic {
        self.window
    }

    /// Totals since the counter was created
    pub fn lifetime(&self) -> Statistic {
        self.lifetime
    }

    /// Return the current window and start a new, empty one
    pub fn take(&mut self) -> Statistic {
        let taken = std::mem::take(&mut self.window);
        debug_assert!(self.window.is_empty(), "Postcondition: window reset");
        taken
    }
}

/// The critical section shared between the consume loop and the reporter
pub type SharedCounter = Arc<Mutex<StatisticsCounter>>;

pub fn shared_counter() -> SharedCounter {
    Arc::new(Mutex::new(StatisticsCounter::new()))
}

/// One emitted summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Report {
    /// 1-based firing number
    pub sequence: u64,
    pub window: Statistic,
    /// Lifetime unique count at the moment of the report
    pub unique_total: u64,
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Received {} unique numbers, {} duplicates. Unique total: {}",
            self.window.unique_count, self.window.duplicate_count, self.unique_total
        )?;
        if self.window.rejected_count > 0 {
            write!(f, ", {} rejected", self.window.rejected_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resets_window_only() {
        let mut counter = StatisticsCounter::new();
        counter.increment_unique();
        counter.increment_unique();
        counter.increment_duplicate();

        let taken = counter.take();
        assert_eq!(taken.unique_count, 2);
        assert_eq!(taken.duplicate_count, 1);
        assert_eq!(taken.processed(), 3);

        assert!(counter.snapshot().is_empty());
        assert_eq!(counter.lifetime().unique_count, 2);
        assert_eq!(counter.lifetime().duplicate_count, 1);
    }

    #[test]
    fn test_rejected_not_processed() {
        let mut counter = StatisticsCounter::new();
        counter.increment_rejected();
        counter.increment_unique();
        assert_eq!(counter.snapshot().processed(), 1);
        assert_eq!(counter.snapshot().rejected_count, 1);
    }

    #[test]
    fn test_report_line() {
        let report = Report {
            sequence: 3,
            window: Statistic {
                unique_count: 50,
                duplicate_count: 2,
                rejected_count: 0,
            },
            unique_total: 567_231,
        };
        assert_eq!(
            report.to_string(),
            "Received 50 unique numbers, 2 duplicates. Unique total: 567231"
        );

        let with_rejects = Report {
            window: Statistic {
                rejected_count: 4,
                ..report.window
            },
            ..report
        };
        assert!(with_rejects.to_string().ends_with(", 4 rejected"));
    }

    #[test]
    fn test_statistic_display() {
        let stat = Statistic {
            unique_count: 3,
            duplicate_count: 2,
            rejected_count: 0,
        };
        assert_eq!(stat.to_string(), "3 unique, 2 duplicates");
    }
}
