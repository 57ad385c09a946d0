//! Canonical view model and the reconciler that keeps it current.
//!
//! Every producer (push channel, status poller, event poller, operator
//! actions) turns what it learned into an [`Update`]. A single [`Reconciler`]
//! applies updates strictly in the order they arrive and publishes the result
//! as a fresh `Arc<ViewModel>`; a published view is never mutated afterwards,
//! so readers can hold one across any number of later updates.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use rdtwatch_types::{ClientStatus, Event, PushFrame, RawEvent, ServerStatus, StatsUpdate};

use super::events::merge_events;
use super::history::{CongestionSample, HistoryBuffer, ThroughputSample};
use super::summary::TransferSummary;
use super::window::{WindowSlot, WindowState};
use crate::source::{ConnectionStatus, ViewReceiver};

/// A normalized change to apply to the view model.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// A decoded push-channel frame.
    Frame(PushFrame),
    /// The push channel changed state.
    Connection(ConnectionStatus),
    /// Response to status poll number `request`.
    Status {
        request: u64,
        server: ServerStatus,
        client: ClientStatus,
    },
    /// Response to event poll number `request`.
    Events {
        request: u64,
        server: Vec<RawEvent>,
        client: Vec<RawEvent>,
    },
    /// A start/stop request for the server succeeded.
    ServerRunning(bool),
    /// The client was configured with a new window size.
    WindowConfigured(u64),
    /// A new transfer is about to start.
    TransferStarted,
    /// The control plane refused (or never answered) the last transfer request.
    TransferFailed,
}

/// The single authoritative state used to drive visualization.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub connection: ConnectionStatus,
    pub server: Arc<ServerStatus>,
    pub client: Arc<ClientStatus>,
    pub throughput_history: Arc<HistoryBuffer<ThroughputSample>>,
    pub congestion_history: Arc<HistoryBuffer<CongestionSample>>,
    /// Merged event list, newest first.
    pub events: Arc<Vec<Event>>,
    /// Last window reported by the sender, if any.
    pub window: Option<WindowState>,
    /// Window size from the operator's configuration, used when the sender omits one.
    pub configured_window_size: u64,
}

impl ViewModel {
    /// Create an empty, disconnected view.
    pub fn new(configured_window_size: u64) -> Self {
        Self {
            connection: ConnectionStatus::Closed,
            server: Arc::new(ServerStatus::default()),
            client: Arc::new(ClientStatus::default()),
            throughput_history: Arc::new(HistoryBuffer::new()),
            congestion_history: Arc::new(HistoryBuffer::new()),
            events: Arc::new(Vec::new()),
            window: None,
            configured_window_size,
        }
    }

    /// Whether the push channel is open.
    pub fn connected(&self) -> bool {
        self.connection == ConnectionStatus::Open
    }

    pub fn summary(&self) -> TransferSummary {
        TransferSummary::from_status(&self.server, &self.client)
    }

    /// Viewport around the live window; empty before the sender reports one.
    pub fn window_slots(&self) -> Vec<WindowSlot> {
        self.window.map(|w| w.slots()).unwrap_or_default()
    }
}

/// Applies updates to the canonical view and publishes each new version.
#[derive(Debug)]
pub struct Reconciler {
    view: Arc<ViewModel>,
    publisher: watch::Sender<Arc<ViewModel>>,
    last_status_request: u64,
    last_events_request: u64,
    /// Histories cleared by the most recent `TransferStarted`, kept until the
    /// request resolves.
    cleared: Option<ClearedHistory>,
    torn_down: bool,
}

#[derive(Debug)]
struct ClearedHistory {
    throughput: Arc<HistoryBuffer<ThroughputSample>>,
    congestion: Arc<HistoryBuffer<CongestionSample>>,
}

impl Reconciler {
    /// Create a reconciler and the receiver the rendering layer reads from.
    pub fn new(configured_window_size: u64) -> (Self, ViewReceiver) {
        let view = Arc::new(ViewModel::new(configured_window_size));
        let (publisher, receiver) = watch::channel(view.clone());
        let reconciler = Self {
            view,
            publisher,
            last_status_request: 0,
            last_events_request: 0,
            cleared: None,
            torn_down: false,
        };
        (reconciler, ViewReceiver::new(receiver))
    }

    /// The current view.
    pub fn view(&self) -> &Arc<ViewModel> {
        &self.view
    }

    /// Stop accepting updates. Anything applied afterwards is dropped.
    pub fn tear_down(&mut self) {
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Apply one update and publish the resulting view.
    ///
    /// Returns `false` if the update was discarded: after teardown, or a poll
    /// response older than one already applied.
    pub fn apply(&mut self, update: Update) -> bool {
        if self.torn_down {
            debug!("dropping update after teardown");
            return false;
        }

        let mut next = ViewModel::clone(&self.view);

        match update {
            Update::Frame(PushFrame::StatsUpdate(stats)) => apply_stats_update(&mut next, stats),
            Update::Frame(PushFrame::Unknown) => {
                debug!("ignoring push frame of unknown type");
                return false;
            }
            Update::Connection(status) => {
                if next.connection == status {
                    return false;
                }
                next.connection = status;
            }
            Update::Status {
                request,
                server,
                client,
            } => {
                if request <= self.last_status_request {
                    debug!(
                        request,
                        latest = self.last_status_request,
                        "discarding stale status response"
                    );
                    return false;
                }
                self.last_status_request = request;
                next.server = Arc::new(server);
                next.client = Arc::new(client);
            }
            Update::Events {
                request,
                server,
                client,
            } => {
                if request <= self.last_events_request {
                    debug!(
                        request,
                        latest = self.last_events_request,
                        "discarding stale events response"
                    );
                    return false;
                }
                self.last_events_request = request;
                next.events = Arc::new(merge_events(server, client));
            }
            Update::ServerRunning(running) => {
                next.server = Arc::new(ServerStatus {
                    running,
                    ..ServerStatus::clone(&next.server)
                });
            }
            Update::WindowConfigured(window_size) => {
                next.configured_window_size = window_size;
            }
            Update::TransferStarted => {
                self.cleared = Some(ClearedHistory {
                    throughput: std::mem::take(&mut next.throughput_history),
                    congestion: std::mem::take(&mut next.congestion_history),
                });
            }
            Update::TransferFailed => {
                let Some(cleared) = self.cleared.take() else {
                    return false;
                };
                next.throughput_history = restore(cleared.throughput, &next.throughput_history);
                next.congestion_history = restore(cleared.congestion, &next.congestion_history);
            }
        }

        self.view = Arc::new(next);
        self.publisher.send_replace(self.view.clone());
        true
    }
}

/// Put back history cleared for a transfer that never started, keeping any
/// samples that arrived since.
fn restore<T: Clone>(
    mut previous: Arc<HistoryBuffer<T>>,
    since: &HistoryBuffer<T>,
) -> Arc<HistoryBuffer<T>> {
    if !since.is_empty() {
        let buffer = Arc::make_mut(&mut previous);
        for sample in since.iter() {
            buffer.push(sample.clone());
        }
    }
    previous
}

/// Fold a `stats_update` frame into the view.
fn apply_stats_update(next: &mut ViewModel, stats: StatsUpdate) {
    let timestamp = stats.timestamp.unwrap_or_else(unix_now);
    let server = stats.server.unwrap_or_default();
    let client = stats.client.unwrap_or_default();

    if let Some(client_stats) = &client.stats {
        if let Some(throughput) = client_stats.throughput_mbps {
            Arc::make_mut(&mut next.throughput_history).push(ThroughputSample {
                timestamp,
                throughput,
                packets_sent: client_stats.packets_sent,
                retransmissions: client_stats.retransmissions,
            });
        }
    }

    if let Some(congestion) = &client.congestion {
        Arc::make_mut(&mut next.congestion_history).push(CongestionSample {
            timestamp,
            cwnd: congestion.cwnd,
            ssthresh: congestion.ssthresh,
            rtt_millis: congestion.srtt.map(|seconds| seconds * 1000.0),
        });
    }

    if let Some(base) = client.base {
        next.window = Some(WindowState {
            base,
            next_seq: client.next_seq.unwrap_or(base),
            window_size: client
                .window_size
                .map(u64::from)
                .unwrap_or(next.configured_window_size),
            total_chunks: client.total_chunks.unwrap_or(0),
        });
    }

    next.server = Arc::new(server);
    next.client = Arc::new(client);
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
