//! Consume loop - owns the membership index and the durable log.
//!
//! ```text
//! producer ──► input channel ──► ConsumeLoop ──► index check ──► log append
//!                                     │
//!                                     └──► SharedCounter (same critical section)
//! ```
//!
//! The receive is the only await point. Cancellation is raced against it
//! (biased toward cancellation), so a value that arrives after shutdown began
//! is never processed and a blocked receive does not need a sentinel value.

use crate::durable_log::LogWriter;
use crate::membership::MembershipIndex;
use crate::stats::SharedCounter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a single value was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification {
    Unique,
    Duplicate,
    /// Outside the index domain; not written, not counted as processed
    Rejected,
}

pub(crate) struct ConsumeLoop {
    input: mpsc::Receiver<i64>,
    index: Box<dyn MembershipIndex>,
    log: Box<dyn LogWriter>,
    counter: SharedCounter,
}

impl ConsumeLoop {
    pub(crate) fn new(
        input: mpsc::Receiver<i64>,
        index: Box<dyn MembershipIndex>,
        log: Box<dyn LogWriter>,
        counter: SharedCounter,
    ) -> Self {
        ConsumeLoop {
            input,
            index,
            log,
            counter,
        }
    }

    /// Run until cancelled or until every producer is gone. Hands the log
    /// back so the owner can flush and close it.
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> Box<dyn LogWriter> {
        loop {
            let value = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("consume loop cancelled");
                    break;
                }
                next = self.input.recv() => match next {
                    Some(value) => value,
                    None => {
                        info!("input channel closed, consume loop exiting");
                        break;
                    }
                },
            };
            self.process(value);
        }

        // Dropping the receiver makes later sends fail instead of queueing
        self.input.close();
        self.log
    }

    /// Classify one value, persisting it if first-seen. Index, log and
    /// counter are updated under one hold of the counter lock.
    pub(crate) fn process(&mut self, value: i64) -> Classification {
        let mut counter = self.counter.lock();

        match self.index.contains(value) {
            Err(e) => {
                warn!(error = %e, "rejecting out-of-domain value");
                counter.increment_rejected();
                Classification::Rejected
            }
            Ok(true) => {
                counter.increment_duplicate();
                Classification::Duplicate
            }
            Ok(false) => {
                // contains() accepted it, so value is in [0, max]
                let offset = value as u64;
                if let Err(e) = self.log.append(offset) {
                    // Not retried: the value still counts as seen and unique
                    error!(value = offset, error = %e, "could not persist value");
                }

                let marked = self.index.mark_seen(value);
                debug_assert!(marked.is_ok(), "Invariant: {} passed the domain check", value);

                counter.increment_unique();
                Classification::Unique
            }
        }
    }
}
