//! Dedup Worker - lifecycle around the consume loop and the reporter.
//!
//! ```text
//! Idle ──start──► Running ──shutdown──► Draining ──log closed──► Stopped
//! ```
//!
//! `shutdown()` cancels the reporter and the consume loop before it yields,
//! so no value sent after the call begins is processed. It then waits for the
//! loop to hand back the durable log and closes it. Close failures are
//! logged; the worker is still marked stopped.

mod consume_loop;

use crate::config::{ConfigError, WorkerConfig};
use crate::durable_log::{FileLog, LogError, LogWriter};
use crate::membership::MembershipIndex;
use crate::reporter::{ConsoleSink, ReportSink, StatsReporter};
use crate::stats::{shared_counter, SharedCounter, Statistic};
use consume_loop::ConsumeLoop;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Producer half of the input channel
pub type ValueSender = mpsc::Sender<i64>;
/// Consumer half of the input channel, handed to the worker
pub type ValueReceiver = mpsc::Receiver<i64>;

/// Bounded input channel between producers and the worker
pub fn input_channel(capacity: usize) -> (ValueSender, ValueReceiver) {
    mpsc::channel(capacity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Shutdown requested; tasks are being cancelled and the log closed
    Draining,
    Stopped,
}

/// Errors that prevent the worker from starting
#[derive(Debug)]
pub enum WorkerError {
    Config(ConfigError),
    LogOpen(LogError),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Config(e) => write!(f, "worker config rejected: {}", e),
            WorkerError::LogOpen(e) => write!(f, "worker cannot start: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Config(e) => Some(e),
            WorkerError::LogOpen(e) => Some(e),
        }
    }
}

impl From<ConfigError> for WorkerError {
    fn from(e: ConfigError) -> Self {
        WorkerError::Config(e)
    }
}

struct WorkerTasks {
    reporter_cancel: CancellationToken,
    reporter: JoinHandle<()>,
    consume_cancel: CancellationToken,
    consume: JoinHandle<Box<dyn LogWriter>>,
}

/// Builder for injecting a log writer, index or report sink
pub struct DedupWorkerBuilder {
    config: WorkerConfig,
    index: Option<Box<dyn MembershipIndex>>,
    log: Option<Box<dyn LogWriter>>,
    sink: Option<Box<dyn ReportSink>>,
}

impl DedupWorkerBuilder {
    pub fn index(mut self, index: Box<dyn MembershipIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Use this writer instead of opening `config.log_path`
    pub fn log_writer(mut self, log: Box<dyn LogWriter>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Open the log and spawn the consume loop and reporter on the current
    /// tokio runtime. A log that cannot be opened is fatal.
    pub fn start(self, input: ValueReceiver) -> Result<DedupWorker, WorkerError> {
        let config = self.config;
        config.validate()?;

        let log = match self.log {
            Some(log) => log,
            None => Box::new(FileLog::create(&config.log_path).map_err(WorkerError::LogOpen)?),
        };
        let index = self
            .index
            .unwrap_or_else(|| config.index.build(config.max_value));
        let sink = self.sink.unwrap_or_else(|| Box::new(ConsoleSink::from_env()));

        let counter = shared_counter();
        let state = Mutex::new(WorkerState::Idle);

        let reporter_cancel = CancellationToken::new();
        let reporter =
            StatsReporter::new(counter.clone(), config.report_interval, sink).spawn(reporter_cancel.clone());

        let consume_cancel = CancellationToken::new();
        let consume = tokio::spawn(
            ConsumeLoop::new(input, index, log, counter.clone()).run(consume_cancel.clone()),
        );

        *state.lock() = WorkerState::Running;
        info!(
            log_path = %config.log_path.display(),
            max_value = config.max_value,
            index = ?config.index,
            report_interval_ms = config.report_interval.as_millis() as u64,
            "dedup worker started"
        );

        Ok(DedupWorker {
            config,
            counter,
            state,
            tasks: Mutex::new(Some(WorkerTasks {
                reporter_cancel,
                reporter,
                consume_cancel,
                consume,
            })),
        })
    }
}

/// Handle to a running dedup worker
pub struct DedupWorker {
    config: WorkerConfig,
    counter: SharedCounter,
    state: Mutex<WorkerState>,
    tasks: Mutex<Option<WorkerTasks>>,
}

impl DedupWorker {
    pub fn builder(config: WorkerConfig) -> DedupWorkerBuilder {
        DedupWorkerBuilder {
            config,
            index: None,
            log: None,
            sink: None,
        }
    }

    /// Start with the file log at `config.log_path` and console reports
    pub fn start(config: WorkerConfig, input: ValueReceiver) -> Result<Self, WorkerError> {
        Self::builder(config).start(input)
    }

    /// Stop the reporter and the consume loop, then close the log.
    /// Returns once all of that is done. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.lock().take();
        let Some(tasks) = tasks else {
            warn!(state = ?self.state(), "shutdown called on a worker that is not running");
            return;
        };

        *self.state.lock() = WorkerState::Draining;
        info!("dedup worker shutting down");

        // Both tokens before the first await: nothing sent from here on is
        // consumed, and the reporter does not fire again.
        tasks.reporter_cancel.cancel();
        tasks.consume_cancel.cancel();

        if let Err(e) = tasks.reporter.await {
            error!(error = %e, "statistics reporter task failed");
        }
        match tasks.consume.await {
            Ok(log) => {
                let written = log.written();
                match log.close() {
                    Ok(()) => info!(written, "durable log closed"),
                    Err(e) => error!(error = %e, "could not close durable log"),
                }
            }
            Err(e) => error!(error = %e, "consume loop task failed, durable log not closed"),
        }

        *self.state.lock() = WorkerState::Stopped;
        let lifetime = self.lifetime();
        info!(
            unique_total = lifetime.unique_count,
            duplicate_total = lifetime.duplicate_count,
            rejected_total = lifetime.rejected_count,
            "dedup worker stopped"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.state() == WorkerState::Stopped
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Counts since the last report
    pub fn statistic(&self) -> Statistic {
        self.counter.lock().snapshot()
    }

    /// Counts since start, never reset
    pub fn lifetime(&self) -> Statistic {
        self.counter.lock().lifetime()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

impl Drop for DedupWorker {
    fn drop(&mut self) {
        // Not shut down: stop the tasks, the log is dropped with the loop
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.reporter_cancel.cancel();
            tasks.consume_cancel.cancel();
        }
    }
}
