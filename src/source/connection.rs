//! Push-channel lifecycle: connect, dispatch, and fixed-delay reconnect.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rdtwatch_types::PushFrame;

use super::{PushChannel, PushTransport};

/// Delay between an unexpected close (or failed attempt) and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// State of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Receives decoded frames and status changes from a [`ConnectionManager`].
///
/// Errors returned by [`handle_frame`](Self::handle_frame) are logged and
/// otherwise ignored; they never affect the connection.
pub trait FrameHandler: Send + Sync + 'static {
    fn handle_frame(&self, frame: PushFrame) -> anyhow::Result<()>;

    /// Called once per status transition, in transition order.
    ///
    /// The manager's state is locked for the duration of the call, so this
    /// must not call back into the [`ConnectionManager`].
    fn status_changed(&self, _status: ConnectionStatus) {}
}

impl<F> FrameHandler for F
where
    F: Fn(PushFrame) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle_frame(&self, frame: PushFrame) -> anyhow::Result<()> {
        self(frame)
    }
}

/// Owns the single push channel and keeps it alive.
///
/// - [`connect`](Self::connect) is a no-op while a channel is open or opening.
/// - A failed attempt or an unexpected close schedules exactly one new attempt
///   after [`RECONNECT_DELAY`]; the delay never grows.
/// - [`disconnect`](Self::disconnect) is the only thing that stops reconnecting.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn PushTransport>,
    handler: Arc<dyn FrameHandler>,
    reconnect_delay: Duration,
    state: Mutex<ChannelState>,
}

struct ChannelState {
    status: ConnectionStatus,
    outbound: Option<mpsc::UnboundedSender<String>>,
    attempt: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    /// Bumped on every connect and disconnect; tasks from an older epoch are stale.
    epoch: u64,
    stopped: bool,
}

impl ChannelState {
    /// Set the status, returning it if it changed.
    fn transition(&mut self, status: ConnectionStatus) -> Option<ConnectionStatus> {
        if self.status == status {
            None
        } else {
            self.status = status;
            Some(status)
        }
    }
}

impl ConnectionManager {
    /// Create a manager. Nothing is opened until [`connect`](Self::connect).
    pub fn new(transport: Arc<dyn PushTransport>, handler: Arc<dyn FrameHandler>) -> Self {
        Self::with_reconnect_delay(transport, handler, RECONNECT_DELAY)
    }

    pub(crate) fn with_reconnect_delay(
        transport: Arc<dyn PushTransport>,
        handler: Arc<dyn FrameHandler>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                handler,
                reconnect_delay,
                state: Mutex::new(ChannelState {
                    status: ConnectionStatus::Closed,
                    outbound: None,
                    attempt: None,
                    reader: None,
                    reconnect: None,
                    epoch: 0,
                    stopped: false,
                }),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    pub fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    /// Open the channel unless one is already open or opening.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut state = self.shared.state.lock();
        state.stopped = false;
        let changed = Shared::begin_attempt(&self.shared, &mut state);
        self.shared.notify(changed);
    }

    /// Close the channel and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let mut state = self.shared.state.lock();
        state.stopped = true;
        state.epoch += 1;
        for task in [
            state.reconnect.take(),
            state.attempt.take(),
            state.reader.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        // Dropping the sender closes the channel.
        state.outbound = None;
        let changed = state.transition(ConnectionStatus::Closed);
        if changed.is_some() {
            info!(endpoint = self.shared.transport.description(), "push channel closed");
        }
        self.shared.notify(changed);
    }

    /// Send a payload if the channel is open; otherwise do nothing.
    pub fn send<T: Serialize>(&self, payload: &T) {
        let state = self.shared.state.lock();
        let Some(outbound) = state.outbound.as_ref() else {
            debug!("push channel not open, dropping outbound payload");
            return;
        };
        match serde_json::to_string(payload) {
            Ok(text) => {
                let _ = outbound.send(text);
            }
            Err(e) => warn!(error = %e, "failed to encode outbound payload"),
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.transport.description())
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    /// Report a transition. Callers hold the state lock so that reports reach
    /// the handler in the order the transitions happened.
    fn notify(&self, changed: Option<ConnectionStatus>) {
        if let Some(status) = changed {
            self.handler.status_changed(status);
        }
    }

    /// Spawn a connection attempt unless one is open or in progress.
    fn begin_attempt(shared: &Arc<Shared>, state: &mut ChannelState) -> Option<ConnectionStatus> {
        if matches!(
            state.status,
            ConnectionStatus::Open | ConnectionStatus::Connecting
        ) {
            return None;
        }

        state.epoch += 1;
        let epoch = state.epoch;
        let task_shared = shared.clone();
        state.attempt = Some(tokio::spawn(async move {
            let result = task_shared.transport.open().await;
            Shared::finish_attempt(&task_shared, epoch, result);
        }));
        state.transition(ConnectionStatus::Connecting)
    }

    fn finish_attempt(
        shared: &Arc<Shared>,
        epoch: u64,
        result: Result<PushChannel, super::TransportError>,
    ) {
        let mut state = shared.state.lock();
        if state.epoch != epoch || state.stopped {
            // Superseded by disconnect(); dropping the channel closes it.
            return;
        }
        state.attempt = None;

        let changed = match result {
            Ok(channel) => {
                info!(endpoint = shared.transport.description(), "push channel open");
                state.outbound = Some(channel.outbound);
                let reader_shared = shared.clone();
                state.reader = Some(tokio::spawn(Shared::read_loop(
                    reader_shared,
                    channel.inbound,
                    epoch,
                )));
                state.transition(ConnectionStatus::Open)
            }
            Err(e) => {
                warn!(
                    endpoint = shared.transport.description(),
                    error = %e,
                    retry_in_ms = shared.reconnect_delay.as_millis() as u64,
                    "failed to open push channel"
                );
                let changed = state.transition(ConnectionStatus::Error);
                Shared::schedule_reconnect(shared, &mut state);
                changed
            }
        };
        shared.notify(changed);
    }

    async fn read_loop(shared: Arc<Shared>, mut inbound: mpsc::Receiver<String>, epoch: u64) {
        while let Some(text) = inbound.recv().await {
            match serde_json::from_str::<PushFrame>(&text) {
                Ok(frame) => {
                    if let Err(e) = shared.handler.handle_frame(frame) {
                        warn!(error = %e, "frame handler failed");
                    }
                }
                Err(e) => warn!(error = %e, "dropping malformed push frame"),
            }
        }

        let mut state = shared.state.lock();
        if state.epoch != epoch || state.stopped {
            return;
        }
        state.outbound = None;
        state.reader = None;
        warn!(
            endpoint = shared.transport.description(),
            retry_in_ms = shared.reconnect_delay.as_millis() as u64,
            "push channel closed unexpectedly"
        );
        let changed = state.transition(ConnectionStatus::Closed);
        Shared::schedule_reconnect(&shared, &mut state);
        shared.notify(changed);
    }

    fn schedule_reconnect(shared: &Arc<Shared>, state: &mut ChannelState) {
        if state.reconnect.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let task_shared = shared.clone();
        let delay = shared.reconnect_delay;
        state.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = task_shared.state.lock();
            state.reconnect = None;
            if state.stopped {
                return;
            }
            debug!("reconnecting push channel");
            let changed = Shared::begin_attempt(&task_shared, &mut state);
            task_shared.notify(changed);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeTransport;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<PushFrame>>,
        statuses: Mutex<Vec<ConnectionStatus>>,
        fail: bool,
    }

    impl FrameHandler for Recorder {
        fn handle_frame(&self, frame: PushFrame) -> anyhow::Result<()> {
            self.frames.lock().push(frame);
            if self.fail {
                anyhow::bail!("handler exploded");
            }
            Ok(())
        }

        fn status_changed(&self, status: ConnectionStatus) {
            self.statuses.lock().push(status);
        }
    }

    fn manager(transport: &Arc<FakeTransport>, recorder: &Arc<Recorder>) -> ConnectionManager {
        ConnectionManager::new(transport.clone(), recorder.clone())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_and_dispatches_frames() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        assert!(manager.is_open());

        let peer = transport.take_peer();
        peer.frames
            .send(r#"{"type": "stats_update", "server": {"running": true}}"#.to_string())
            .await
            .unwrap();
        settle().await;

        assert_eq!(recorder.frames.lock().len(), 1);
        assert_eq!(
            *recorder.statuses.lock(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Open]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        manager.connect();
        settle().await;
        manager.connect();
        settle().await;

        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_dropped() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        let peer = transport.take_peer();
        peer.frames.send("{not json".to_string()).await.unwrap();
        peer.frames
            .send(r#"{"type": "stats_update"}"#.to_string())
            .await
            .unwrap();
        settle().await;

        assert!(manager.is_open());
        assert_eq!(recorder.frames.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_failure_keeps_channel_open() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        let peer = transport.take_peer();
        for _ in 0..2 {
            peer.frames
                .send(r#"{"type": "stats_update"}"#.to_string())
                .await
                .unwrap();
        }
        settle().await;

        assert!(manager.is_open());
        assert_eq!(recorder.frames.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_close_reconnects_once_after_delay() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        drop(transport.take_peer());
        settle().await;
        assert_eq!(manager.status(), ConnectionStatus::Closed);

        tokio::time::sleep(Duration::from_millis(2990)).await;
        assert_eq!(transport.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.attempts(), 2);
        assert!(manager.is_open());

        // No further attempts while the new channel stays open.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        drop(transport.take_peer());
        settle().await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_open_does_not_reconnect() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        let mut peer = transport.take_peer();
        manager.disconnect();
        settle().await;

        // Local close is visible to the remote end.
        assert!(peer.sent.recv().await.is_none());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_retries_at_fixed_delay() {
        let transport = Arc::new(FakeTransport::failing(2));
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        assert_eq!(manager.status(), ConnectionStatus::Error);
        assert_eq!(transport.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(3010)).await;
        assert_eq!(transport.attempts(), 2);
        assert_eq!(manager.status(), ConnectionStatus::Error);

        // Same delay again, no growth.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(transport.attempts(), 3);
        assert!(manager.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_when_closed_is_noop() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.send(&serde_json::json!({"type": "ping"}));
        assert_eq!(manager.status(), ConnectionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_when_open_reaches_peer() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        let mut peer = transport.take_peer();
        manager.send(&serde_json::json!({"type": "ping"}));

        assert_eq!(peer.sent.recv().await.as_deref(), Some(r#"{"type":"ping"}"#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_status_reports_follow_transition_order() {
        for _ in 0..50 {
            let transport = Arc::new(FakeTransport::closing());
            let recorder = Arc::new(Recorder::default());
            let manager = ConnectionManager::with_reconnect_delay(
                transport.clone(),
                recorder.clone(),
                Duration::from_secs(3600),
            );

            manager.connect();
            for _ in 0..1000 {
                if recorder.statuses.lock().len() >= 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            assert_eq!(
                *recorder.statuses.lock(),
                vec![
                    ConnectionStatus::Connecting,
                    ConnectionStatus::Open,
                    ConnectionStatus::Closed
                ]
            );
            assert_eq!(manager.status(), ConnectionStatus::Closed);
            manager.disconnect();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_disconnect_reopens() {
        let transport = Arc::new(FakeTransport::default());
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&transport, &recorder);

        manager.connect();
        settle().await;
        manager.disconnect();
        manager.connect();
        settle().await;

        assert_eq!(transport.attempts(), 2);
        assert!(manager.is_open());
    }
}
