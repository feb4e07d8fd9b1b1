//! Line ingest server - a TCP producer for the dedup worker.
//!
//! Each client sends newline-terminated lines. A value line is forwarded to
//! the input channel; `terminate` cancels the shared terminate token; any
//! other line disconnects that client. At most `max_clients` connections are
//! served at once, extra connections are closed on accept.

mod line;

pub use line::{parse_line, Line, TERMINATE};

use crate::config::IngestConfig;
use crate::worker::ValueSender;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest line accepted before the client is dropped
const LINE_LENGTH_MAX: usize = 64;

pub struct IngestServer {
    listener: TcpListener,
    config: IngestConfig,
    tx: ValueSender,
    permits: Arc<Semaphore>,
    terminate: CancellationToken,
}

impl IngestServer {
    pub async fn bind(
        config: IngestConfig,
        tx: ValueSender,
        terminate: CancellationToken,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let permits = Arc::new(Semaphore::new(config.max_clients));
        Ok(IngestServer {
            listener,
            config,
            tx,
            permits,
            terminate,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until the terminate token is cancelled
    pub async fn run(self) {
        info!(
            addr = %self.config.bind_addr,
            max_clients = self.config.max_clients,
            "ingest server listening"
        );

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.terminate.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, addr) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let permit = match self.permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(client = %addr, "client limit reached, closing connection");
                    drop(stream);
                    continue;
                }
            };

            let handler = ClientHandler {
                tx: self.tx.clone(),
                terminate: self.terminate.clone(),
                digits: self.config.digits,
                addr,
            };
            tokio::spawn(async move {
                handler.run(stream).await;
                drop(permit);
            });
        }

        info!("ingest server stopped");
    }
}

struct ClientHandler {
    tx: ValueSender,
    terminate: CancellationToken,
    digits: usize,
    addr: SocketAddr,
}

impl ClientHandler {
    async fn run(self, stream: TcpStream) {
        debug!(client = %self.addr, "client connected");
        let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(LINE_LENGTH_MAX));

        loop {
            let next = tokio::select! {
                biased;
                _ = self.terminate.cancelled() => break,
                next = lines.next() => next,
            };

            let text = match next {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    warn!(client = %self.addr, error = %e, "unreadable input, disconnecting");
                    break;
                }
                None => break,
            };

            match parse_line(&text, self.digits) {
                Line::Value(value) => {
                    if self.tx.send(value).await.is_err() {
                        debug!(client = %self.addr, "worker input closed");
                        break;
                    }
                }
                Line::Terminate => {
                    info!(client = %self.addr, "terminate requested");
                    self.terminate.cancel();
                    break;
                }
                Line::Invalid => {
                    warn!(client = %self.addr, "invalid line, disconnecting");
                    break;
                }
            }
        }

        debug!(client = %self.addr, "client disconnected");
    }
}
