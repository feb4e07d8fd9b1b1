//! Statistics Reporter - periodic read-and-reset of the shared counter.
//!
//! Fires immediately on spawn, then every `period`, whether or not any value
//! arrived. Each firing takes the window under the counter lock, so an
//! increment lands either in this report or in the next one, never both.

use crate::observability::json_from_env;
use crate::stats::{Report, SharedCounter};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Destination for reports
pub trait ReportSink: Send + 'static {
    fn emit(&mut self, report: &Report);
}

/// Prints one line per report to stdout: the summary sentence, or the report
/// as a JSON object when `json` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink {
    pub json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        ConsoleSink { json }
    }

    /// JSON when `DEDUP_LOG_JSON` is set, matching the log format
    pub fn from_env() -> Self {
        Self::new(json_from_env())
    }

    pub fn render(&self, report: &Report) -> String {
        if self.json {
            match serde_json::to_string(report) {
                Ok(line) => return line,
                Err(e) => warn!(error = %e, "could not encode report as JSON"),
            }
        }
        report.to_string()
    }
}

impl ReportSink for ConsoleSink {
    fn emit(&mut self, report: &Report) {
        debug!(sequence = report.sequence, "emitting statistics report");
        println!("{}", self.render(report));
    }
}

/// Forwards reports to a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Report>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn emit(&mut self, report: &Report) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(*report);
    }
}

pub struct StatsReporter {
    counter: SharedCounter,
    period: Duration,
    sink: Box<dyn ReportSink>,
    sequence: u64,
}

impl StatsReporter {
    pub fn new(counter: SharedCounter, period: Duration, sink: Box<dyn ReportSink>) -> Self {
        debug_assert!(!period.is_zero(), "Precondition: period must be non-zero");
        StatsReporter {
            counter,
            period,
            sink,
            sequence: 0,
        }
    }

    /// Take the current window and emit it
    pub fn fire(&mut self) -> Report {
        self.sequence = self.sequence.saturating_add(1);
        let report = {
            let mut counter = self.counter.lock();
            let window = counter.take();
            Report {
                sequence: self.sequence,
                window,
                unique_total: counter.lifetime().unique_count,
            }
        };
        self.sink.emit(&report);
        report
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut tick = interval(self.period);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    self.fire();
                }
            }
        }

        debug!(firings = self.sequence, "statistics reporter stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
