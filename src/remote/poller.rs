//! Periodic background sync against the remote quote source.
//!
//! The poller wakes once per interval, fetches the remote set, and merges it
//! into the shared store. A failed fetch is logged and the next tick goes
//! ahead unchanged; there is no retry or backoff. The clock is tokio's, so
//! tests drive it with paused time.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::client::{RemoteError, RemoteQuoteSource};
use crate::quote::SharedStore;
use crate::storage::KeyValueStore;

/// Outcome of one successful reconcile pass.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Quotes returned by the remote source
    pub fetched: usize,
    /// Quotes appended to the local collection
    pub added: usize,
    /// Collection size after the merge
    pub total: usize,
    pub at: DateTime<Utc>,
}

/// Notifications emitted by the poller.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// New quotes were merged and saved
    QuotesAdded { count: usize, at: DateTime<Utc> },
    /// The fetch failed; the next tick will try again
    FetchFailed { error: String },
}

/// Fetch once and merge the result into `store`.
///
/// The fetch happens before the store lock is taken, so a slow endpoint
/// never blocks local operations.
pub async fn sync_once<S: KeyValueStore>(
    store: &SharedStore<S>,
    source: &dyn RemoteQuoteSource,
) -> Result<SyncReport, RemoteError> {
    let incoming = source.fetch().await?;
    let fetched = incoming.len();

    let mut store = store.lock().await;
    let added = store.merge_remote(incoming).await;
    let report = SyncReport {
        fetched,
        added,
        total: store.len(),
        at: Utc::now(),
    };

    if added > 0 {
        tracing::info!(
            fetched = report.fetched,
            added = report.added,
            total = report.total,
            "Quotes synced from server"
        );
    } else {
        tracing::debug!(fetched = report.fetched, "Sync found nothing new");
    }
    Ok(report)
}

/// Handle to a running poll loop.
///
/// [`shutdown`](Self::shutdown) stops it cleanly; dropping the handle
/// aborts the task.
pub struct SyncPoller {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncPoller {
    /// Start polling `source` every `period`, merging into `store`.
    ///
    /// The first fetch happens one full period after the call. Ticks missed
    /// while a slow fetch is in flight are delayed rather than bunched up.
    pub fn spawn<S>(
        store: SharedStore<S>,
        source: Arc<dyn RemoteQuoteSource>,
        period: Duration,
        events: Option<mpsc::Sender<SyncEvent>>,
    ) -> Self
    where
        S: KeyValueStore + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_ms = period.as_millis() as u64, "Sync poller started");

            loop {
                tokio::select! {
                    biased;

                    // Err means every sender is gone, which is also a stop
                    _ = shutdown_rx.changed() => break,

                    _ = ticker.tick() => {}
                }

                let event = match sync_once(&store, source.as_ref()).await {
                    Ok(report) if report.added > 0 => Some(SyncEvent::QuotesAdded {
                        count: report.added,
                        at: report.at,
                    }),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to fetch quotes from server");
                        Some(SyncEvent::FetchFailed { error: e.to_string() })
                    }
                };

                // A full channel must not hold off shutdown
                if let (Some(tx), Some(event)) = (events.as_ref(), event) {
                    tokio::select! {
                        biased;

                        _ = shutdown_rx.changed() => break,

                        sent = tx.send(event) => {
                            if let Err(e) = sent {
                                tracing::debug!(error = %e, "Sync event receiver dropped");
                            }
                        }
                    }
                }
            }

            tracing::debug!("Sync poller stopped");
        });

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop and wait for it. An in-flight sync finishes
    /// first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Sync poller task failed");
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SyncPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
