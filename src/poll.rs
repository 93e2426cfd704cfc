//! Background feed polling.
//!
//! Runs on a dedicated thread: fetch, publish the outcome as the reconciler's
//! article input, then sleep until the next tick or an explicit refresh.
//! Fetching blocks, so it never runs on the UI thread or inside the async
//! runtime.
//!
//! ## For contributors
//!
//! Every fetch is a full refetch.  A failure replaces the published state
//! with [`FeedState::Failed`], which the reconciler turns into a visible
//! error; the next successful fetch replaces it again.  There is no retry
//! or backoff beyond the regular tick.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::reconcile::FeedState;
use crate::source::FeedSource;

/// Handle to the polling thread.
///
/// The thread stops once every refresh sender (this handle's and the clones
/// from [`refresh_handle`](Poller::refresh_handle)) has been dropped.
pub struct Poller {
    refresh_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// A sender that triggers an immediate refetch.
    pub fn refresh_handle(&self) -> mpsc::Sender<()> {
        self.refresh_tx.clone()
    }

    /// Drop this handle's sender and wait for the thread, assuming no other
    /// refresh handles are alive.
    #[cfg(test)]
    pub fn stop(self) -> thread::Result<()> {
        drop(self.refresh_tx);
        self.handle.join()
    }
}

/// Fetch once and turn the outcome into the reconciler's feed input.
pub fn fetch_once(source: &dyn FeedSource) -> FeedState {
    match source.fetch() {
        Ok(articles) => {
            info!(source = source.name(), count = articles.len(), "fetched feed");
            FeedState::Loaded(articles)
        }
        Err(err) => {
            warn!(source = source.name(), %err, "fetch failed");
            FeedState::Failed(format!("{}: {err}", source.name()))
        }
    }
}

/// Spawn the background polling thread.
///
/// The first fetch starts immediately.
pub fn spawn(
    source: Arc<dyn FeedSource>,
    feed_tx: watch::Sender<FeedState>,
    interval: Duration,
) -> Poller {
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || loop {
        feed_tx.send_replace(fetch_once(source.as_ref()));

        match refresh_rx.recv_timeout(interval) {
            Ok(()) => {
                // Collapse a burst of refresh requests into one fetch.
                while refresh_rx.try_recv().is_ok() {}
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    });

    Poller { refresh_tx, handle }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
