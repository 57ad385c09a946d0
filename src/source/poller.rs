//! Timer-driven pull loops for status snapshots and event logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::ControlPlane;
use crate::data::{Update, EVENTS_PER_ORIGIN};

/// How often server and client status are fetched.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// How often the event logs are fetched.
pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The two independent pollers.
///
/// Each tick spawns its fetch without waiting for the previous one, so
/// requests may overlap and resolve out of order. Every fetch carries a
/// per-kind request number so the reconciler can drop responses older than
/// one it already applied.
#[derive(Debug, Clone)]
pub struct PollerSet {
    control: Arc<dyn ControlPlane>,
    status_interval: Duration,
    event_interval: Duration,
}

impl PollerSet {
    pub fn new(control: Arc<dyn ControlPlane>) -> Self {
        Self {
            control,
            status_interval: STATUS_POLL_INTERVAL,
            event_interval: EVENT_POLL_INTERVAL,
        }
    }

    /// Start both loops, sending results into `updates`.
    ///
    /// The first fetch of each kind happens immediately. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, updates: mpsc::UnboundedSender<Update>) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);

        let status_counter = Arc::new(AtomicU64::new(0));
        let control = self.control.clone();
        let status_updates = updates.clone();
        tokio::spawn(run_loop(self.status_interval, stop_rx.clone(), move || {
            let request = status_counter.fetch_add(1, Ordering::Relaxed) + 1;
            tokio::spawn(fetch_status(control.clone(), status_updates.clone(), request));
        }));

        let events_counter = Arc::new(AtomicU64::new(0));
        let control = self.control.clone();
        tokio::spawn(run_loop(self.event_interval, stop_rx, move || {
            let request = events_counter.fetch_add(1, Ordering::Relaxed) + 1;
            tokio::spawn(fetch_events(control.clone(), updates.clone(), request));
        }));

        PollerHandle { stop_tx }
    }
}

/// Handle for stopping the pollers.
///
/// Drop this handle to stop polling, or call `stop()` explicitly. Fetches
/// already in flight are not aborted; the reconciler ignores what they
/// deliver after teardown.
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
}

impl PollerHandle {
    /// Cancel both poll timers.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn run_loop<F>(period: Duration, mut stop_rx: watch::Receiver<bool>, mut on_tick: F)
where
    F: FnMut() + Send + 'static,
{
    let mut interval_timer = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval_timer.tick() => on_tick(),
            changed = stop_rx.changed() => {
                // A send of `true` or the handle being dropped both end the loop.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn fetch_status(
    control: Arc<dyn ControlPlane>,
    updates: mpsc::UnboundedSender<Update>,
    request: u64,
) {
    let (server, client) = tokio::join!(control.server_status(), control.client_status());
    match (server, client) {
        (Ok(server), Ok(client)) => {
            let _ = updates.send(Update::Status {
                request,
                server,
                client,
            });
        }
        (Err(e), _) | (_, Err(e)) => warn!(request, error = %e, "status poll failed"),
    }
}

async fn fetch_events(
    control: Arc<dyn ControlPlane>,
    updates: mpsc::UnboundedSender<Update>,
    request: u64,
) {
    let (server, client) = tokio::join!(
        control.server_events(EVENTS_PER_ORIGIN),
        control.client_events(EVENTS_PER_ORIGIN)
    );
    // A failed event poll silently keeps the last list.
    if let (Ok(server), Ok(client)) = (server, client) {
        let _ = updates.send(Update::Events {
            request,
            server,
            client,
        });
    }
}
