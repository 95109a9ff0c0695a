//! Driver runs the receive-decode-track loop in a background task

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::collector::{Collector, CollectorStats};
use crate::provider::DatagramProvider;
use crate::session::SessionSnapshot;
use crate::sink::Sink;

/// Consecutive provider errors tolerated before the loop gives up.
pub const MAX_ERRORS: u32 = 10;

/// Handle to a running driver task.
pub struct DriverHandle {
    /// Latest session snapshot; `None` until the first session body
    pub sessions: watch::Receiver<Option<SessionSnapshot>>,
    /// Cancellation token for cooperative shutdown
    pub cancel: CancellationToken,
    task: JoinHandle<CollectorStats>,
}

impl DriverHandle {
    /// Stream of session snapshots, yielding the current one first if a
    /// session is already established.
    pub fn session_updates(&self) -> impl Stream<Item = SessionSnapshot> + 'static {
        WatchStream::new(self.sessions.clone()).filter_map(|opt| async move { opt })
    }

    pub fn current_session(&self) -> Option<SessionSnapshot> {
        self.sessions.borrow().clone()
    }

    /// Request shutdown. Whatever datagram is in flight may be lost.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to end and return its final counters.
    pub async fn join(self) -> CollectorStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Driver task failed: {}", e);
                CollectorStats::default()
            }
        }
    }
}

/// Spawns the single sequential processing loop.
///
/// One datagram is fully decoded and folded into the session state before
/// the next is requested from the provider.
pub struct Driver;

impl Driver {
    pub fn spawn<P, S>(provider: P, collector: Collector<S>) -> DriverHandle
    where
        P: DatagramProvider,
        S: Sink + 'static,
    {
        let (session_tx, session_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move { Self::receive_task(provider, collector, session_tx, cancel_task).await });

        DriverHandle { sessions: session_rx, cancel, task }
    }

    async fn receive_task<P, S>(
        mut provider: P,
        mut collector: Collector<S>,
        session_tx: watch::Sender<Option<SessionSnapshot>>,
        cancel: CancellationToken,
    ) -> CollectorStats
    where
        P: DatagramProvider,
        S: Sink,
    {
        info!("Receive task started");
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive task cancelled");
                    break;
                }
                result = provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    collector.ingest(&datagram);

                    let snapshot = collector.snapshot();
                    if snapshot.has_session() {
                        session_tx.send_if_modified(|current| {
                            if current.as_ref() == Some(&snapshot) {
                                false
                            } else {
                                trace!(lap = snapshot.current_lap, sector = snapshot.current_sector, "Session state changed");
                                *current = Some(snapshot);
                                true
                            }
                        });
                    }
                }
                Ok(None) => {
                    info!("Provider stream ended");
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    warn!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        let stats = collector.stats();
        debug!(?stats, "Receive task ended");
        info!(
            received = stats.received,
            processed = stats.processed,
            lap_points = stats.tracker.lap_points,
            live_points = stats.tracker.live_points,
            "Receive task finished"
        );
        stats
    }
}
