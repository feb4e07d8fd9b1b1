pub mod config;
pub mod durable_log;
pub mod ingest;
pub mod membership;
pub mod observability;
pub mod reporter;
pub mod stats;
pub mod worker;

pub use config::{ConfigError, IngestConfig, WorkerConfig};
pub use durable_log::{FileLog, LogError, LogWriter, MemoryLog, SimulatedLog, SimulatedLogConfig};
pub use membership::{BitsetIndex, DomainError, HashedIndex, IndexKind, MembershipIndex};
pub use reporter::{ChannelSink, ConsoleSink, ReportSink, StatsReporter};
pub use stats::{Report, Statistic, StatisticsCounter};
pub use worker::{input_channel, DedupWorker, ValueReceiver, ValueSender, WorkerError, WorkerState};
