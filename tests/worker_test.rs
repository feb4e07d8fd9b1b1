//! Dedup Worker Integration Tests
//!
//! Runs the full worker (consume loop + reporter) against file, memory and
//! fault-injecting logs, verifying:
//! - first-occurrence ordering in the durable log
//! - counter totals across reporting windows
//! - shutdown while blocked on input
//! - fatal open errors and absorbed write/close errors

use dedup_worker::{
    input_channel, ChannelSink, DedupWorker, IndexKind, MemoryLog, Report, SimulatedLog,
    SimulatedLogConfig, Statistic, WorkerConfig, WorkerError, WorkerState,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

async fn wait_for_processed(worker: &DedupWorker, expected: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let lifetime = worker.lifetime();
        let seen = lifetime.processed() + lifetime.rejected_count;
        if seen >= expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker processed {} of {} values before timeout",
            seen,
            expected
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn drain_reports(rx: &mut UnboundedReceiver<Report>) -> Vec<Report> {
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    reports
}

fn sum_windows(reports: &[Report], residual: Statistic) -> Statistic {
    reports.iter().fold(residual, |acc, r| Statistic {
        unique_count: acc.unique_count + r.window.unique_count,
        duplicate_count: acc.duplicate_count + r.window.duplicate_count,
        rejected_count: acc.rejected_count + r.window.rejected_count,
    })
}

// ============================================================================
// Ordering and counting
// ============================================================================

#[tokio::test]
async fn test_example_sequence_file_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig::test(dir.path());
    let log_path = config.log_path.clone();
    let (sink, mut reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(config)
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    for v in [5, 5, 7, 5, 9] {
        tx.send(v).await.unwrap();
    }
    wait_for_processed(&worker, 5).await;

    // Flushed per write: visible before shutdown
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "5\n7\n9\n");

    let lifetime = worker.lifetime();
    assert_eq!(lifetime.unique_count, 3);
    assert_eq!(lifetime.duplicate_count, 2);

    worker.shutdown().await;
    assert!(worker.is_shut_down());
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "5\n7\n9\n");

    let reports = drain_reports(&mut reports);
    assert!(!reports.is_empty(), "reporter fires immediately at start");
    let total = sum_windows(&reports, worker.statistic());
    assert_eq!(total.unique_count, 3);
    assert_eq!(total.duplicate_count, 2);
}

#[tokio::test]
async fn test_hashed_index_same_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        index: IndexKind::Hashed,
        max_value: 999_999_999,
        ..WorkerConfig::test(dir.path())
    };
    let log = MemoryLog::new();
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(config)
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    for v in [999_999_999, 5, 999_999_999, 0, 5] {
        tx.send(v).await.unwrap();
    }
    wait_for_processed(&worker, 5).await;
    worker.shutdown().await;

    assert_eq!(log.entries(), vec![999_999_999, 5, 0]);
    assert_eq!(worker.lifetime().duplicate_count, 2);
}

#[tokio::test]
async fn test_out_of_domain_values_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log = MemoryLog::new();
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(WorkerConfig::test(dir.path()))
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    for v in [-3, 1_000_001, 4, i64::MAX, 4] {
        tx.send(v).await.unwrap();
    }
    wait_for_processed(&worker, 5).await;
    worker.shutdown().await;

    assert_eq!(log.entries(), vec![4]);
    let lifetime = worker.lifetime();
    assert_eq!(lifetime.rejected_count, 3);
    assert_eq!(lifetime.unique_count, 1);
    assert_eq!(lifetime.duplicate_count, 1);
}

// ============================================================================
// Shutdown and cancellation
// ============================================================================

#[tokio::test]
async fn test_shutdown_while_blocked_on_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig::test(dir.path());
    let log_path = config.log_path.clone();
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(config)
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    tx.send(11).await.unwrap();
    wait_for_processed(&worker, 1).await;

    // Loop is now parked on the receive with the producer still alive
    tokio::time::timeout(Duration::from_secs(2), worker.shutdown())
        .await
        .expect("shutdown must not wait for another value");

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "11\n");

    // Nothing sent after shutdown is processed
    assert!(tx.send(12).await.is_err());
    assert_eq!(worker.lifetime().unique_count, 1);
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "11\n");
}

#[tokio::test]
async fn test_value_racing_shutdown_is_not_processed() {
    let log = MemoryLog::new();
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);
    let dir = tempfile::tempdir().unwrap();

    let worker = DedupWorker::builder(WorkerConfig::test(dir.path()))
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    tx.send(1).await.unwrap();
    wait_for_processed(&worker, 1).await;

    // Single-threaded runtime: the producer first runs when shutdown yields,
    // i.e. after shutdown has begun.
    let producer = tokio::spawn(async move { tx.send(42).await.is_ok() });
    worker.shutdown().await;
    producer.await.unwrap();

    assert!(worker.is_shut_down());
    assert_eq!(log.entries(), vec![1]);
    assert_eq!(worker.lifetime().unique_count, 1);
    assert_eq!(worker.lifetime().duplicate_count, 0);
}

#[tokio::test]
async fn test_shutdown_after_producers_gone() {
    let log = MemoryLog::new();
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);
    let dir = tempfile::tempdir().unwrap();

    let worker = DedupWorker::builder(WorkerConfig::test(dir.path()))
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    tx.send(1).await.unwrap();
    tx.send(2).await.unwrap();
    drop(tx);
    wait_for_processed(&worker, 2).await;

    // Loop already exited; log stays open until shutdown
    assert!(!log.is_closed());
    worker.shutdown().await;
    assert!(log.is_closed());
    assert_eq!(log.entries(), vec![1, 2]);
}

#[tokio::test]
async fn test_no_reports_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        report_interval: Duration::from_millis(5),
        ..WorkerConfig::test(dir.path())
    };
    let (sink, mut reports) = ChannelSink::channel();
    let (_tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(config)
        .log_writer(Box::new(MemoryLog::new()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    worker.shutdown().await;

    let before = drain_reports(&mut reports).len();
    assert!(before >= 2);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(reports.try_recv().is_err());
}

// ============================================================================
// Failure semantics
// ============================================================================

#[tokio::test]
async fn test_open_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        log_path: dir.path().join("no-such-dir").join("numbers.log"),
        ..WorkerConfig::test(dir.path())
    };
    let (_tx, rx) = input_channel(4);

    match DedupWorker::start(config, rx) {
        Err(WorkerError::LogOpen(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("worker must not start without its log"),
    }
}

#[tokio::test]
async fn test_write_failure_counts_unique_and_seen() {
    let dir = tempfile::tempdir().unwrap();
    let log = SimulatedLog::new(
        9,
        SimulatedLogConfig {
            write_fail_prob: 1.0,
            fail_close: false,
        },
    );
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(WorkerConfig::test(dir.path()))
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    for v in [1, 2, 1] {
        tx.send(v).await.unwrap();
    }
    wait_for_processed(&worker, 3).await;
    worker.shutdown().await;

    assert!(log.entries().is_empty());
    assert_eq!(log.failed(), vec![1, 2]);
    let lifetime = worker.lifetime();
    assert_eq!(lifetime.unique_count, 2);
    assert_eq!(lifetime.duplicate_count, 1);
}

#[tokio::test]
async fn test_close_failure_still_stops() {
    let dir = tempfile::tempdir().unwrap();
    let log = SimulatedLog::new(
        3,
        SimulatedLogConfig {
            write_fail_prob: 0.0,
            fail_close: true,
        },
    );
    let (sink, _reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(16);

    let worker = DedupWorker::builder(WorkerConfig::test(dir.path()))
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    tx.send(6).await.unwrap();
    wait_for_processed(&worker, 1).await;
    worker.shutdown().await;

    assert!(worker.is_shut_down());
    assert!(log.is_closed());
    assert_eq!(log.entries(), vec![6]);
}

// ============================================================================
// Concurrent reporting stress
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reports_never_lose_or_double_count() {
    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 5_000;
    const DISTINCT: i64 = 3_000;
    const TOTAL: u64 = (PRODUCERS * PER_PRODUCER) as u64;

    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        report_interval: Duration::from_millis(2),
        ..WorkerConfig::test(dir.path())
    };
    let log = MemoryLog::new();
    let (sink, mut reports) = ChannelSink::channel();
    let (tx, rx) = input_channel(64);

    let worker = DedupWorker::builder(config)
        .log_writer(Box::new(log.clone()))
        .sink(Box::new(sink))
        .start(rx)
        .unwrap();

    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let tx = tx.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..PER_PRODUCER {
                let value = (i * PRODUCERS + p) % DISTINCT;
                tx.send(value).await.unwrap();
                if i % 500 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    wait_for_processed(&worker, TOTAL).await;
    worker.shutdown().await;

    let reports = drain_reports(&mut reports);
    assert!(reports.len() >= 2, "expected several reporting windows");
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.sequence, i as u64 + 1);
    }

    let total = sum_windows(&reports, worker.statistic());
    assert_eq!(total.processed(), TOTAL);
    assert_eq!(total.unique_count, DISTINCT as u64);
    assert_eq!(total.duplicate_count, TOTAL - DISTINCT as u64);

    let entries = log.entries();
    assert_eq!(entries.len(), DISTINCT as usize);
    let distinct: HashSet<u64> = entries.iter().copied().collect();
    assert_eq!(distinct.len(), entries.len(), "log must not repeat a value");
}
