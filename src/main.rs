//! Dedup worker with a TCP line producer.
//!
//! Clients send nine-digit values, one per line. First-seen values are
//! appended to the durable log; a summary is printed every report interval.
//! A client sending `terminate`, or Ctrl+C, shuts the process down.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | DEDUP_CONFIG | - | TOML worker config (overrides DEDUP_* worker vars) |
//! | DEDUP_LOG_PATH | `<temp_dir>/numbers.log` | Durable log file |
//! | DEDUP_BIND_ADDR | 0.0.0.0:4000 | Listen address |
//! | DEDUP_MAX_CLIENTS | 5 | Concurrent clients |
//! | DEDUP_LOG_JSON | false | JSON log and report output |
//! | RUST_LOG | info | Log filter |

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use dedup_worker::ingest::IngestServer;
use dedup_worker::observability::{init_tracing, json_from_env};
use dedup_worker::{input_channel, DedupWorker, IngestConfig, WorkerConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(json_from_env());

    let worker_config = match std::env::var("DEDUP_CONFIG") {
        Ok(path) => WorkerConfig::load(path)?,
        Err(_) => WorkerConfig::from_env(),
    };
    let ingest_config = IngestConfig::from_env();

    let (tx, rx) = input_channel(worker_config.input_capacity);
    let worker = DedupWorker::start(worker_config, rx)?;

    let terminate = CancellationToken::new();
    let server = match IngestServer::bind(ingest_config, tx, terminate.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "could not bind ingest server");
            worker.shutdown().await;
            return Err(e.into());
        }
    };
    let server_task = tokio::spawn(server.run());

    tokio::select! {
        _ = terminate.cancelled() => {
            info!("terminate received from client");
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            terminate.cancel();
        }
    }

    if let Err(e) = server_task.await {
        error!(error = %e, "ingest server task failed");
    }
    worker.shutdown().await;

    info!("shutdown complete");
    Ok(())
}
