//! In-memory push transport and control plane for tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rdtwatch_types::{
    ActionResponse, ClientConfig, ClientState, ClientStats, ClientStatus, DemoRequest,
    DemoResult, HealthReport, ProtocolInfo, ProtocolMode, RawEvent, ReceivedFile, ReportRequest,
    ServerConfig, ServerStatus, TransferRecord, TransferRequest, TransferResponse,
};

use super::{ControlError, ControlPlane, Download, PushChannel, PushTransport, TransportError};

/// Remote end of a fake push channel.
#[derive(Debug)]
pub(crate) struct Peer {
    /// Frames to deliver to the dashboard; drop to close from the remote side.
    pub frames: mpsc::Sender<String>,
    /// Payloads the dashboard sent.
    pub sent: mpsc::UnboundedReceiver<String>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    close_on_open: bool,
    peers: Mutex<Vec<Peer>>,
}

impl FakeTransport {
    /// A transport whose first `times` attempts fail.
    pub fn failing(times: usize) -> Self {
        let transport = Self::default();
        transport.failures_left.store(times, Ordering::SeqCst);
        transport
    }

    /// A transport whose channels are closed by the remote end as soon as
    /// they open.
    pub fn closing() -> Self {
        Self {
            close_on_open: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The remote end of the most recently opened channel.
    pub fn take_peer(&self) -> Peer {
        self.peers.lock().pop().expect("no open peer")
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn open(&self) -> Result<PushChannel, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransportError::Connect("refused".to_string()));
        }

        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        if self.close_on_open {
            drop(frames_tx);
            return Ok(PushChannel {
                inbound: frames_rx,
                outbound: sent_tx,
            });
        }
        self.peers.lock().push(Peer {
            frames: frames_tx,
            sent: sent_rx,
        });
        Ok(PushChannel {
            inbound: frames_rx,
            outbound: sent_tx,
        })
    }

    fn description(&self) -> &str {
        "fake"
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeControlPlane {
    pub status_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
    pub fail_status: AtomicBool,
    pub fail_events: AtomicBool,
    pub reject_actions: AtomicBool,
    /// Scripted status responses, each served after its delay. Empty means idle, immediately.
    pub status_script: Mutex<VecDeque<(Duration, ServerStatus)>>,
    pub server_events: Mutex<Vec<RawEvent>>,
    pub client_events: Mutex<Vec<RawEvent>>,
    pub transfers: Mutex<Vec<TransferRecord>>,
    /// Received files and their contents.
    pub files: Mutex<Vec<(ReceivedFile, Vec<u8>)>>,
    /// Last report request, with the endpoint it went to.
    pub report_requests: Mutex<Vec<(String, ReportRequest)>>,
    pub demo_requests: Mutex<Vec<DemoRequest>>,
    /// Names of the actions invoked, in order.
    pub actions: Mutex<Vec<String>>,
}

impl FakeControlPlane {
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    pub fn script_status(&self, delay: Duration, server: ServerStatus) {
        self.status_script.lock().push_back((delay, server));
    }

    fn record(&self, action: &str) -> Result<(), ControlError> {
        self.actions.lock().push(action.to_string());
        if self.reject_actions.load(Ordering::SeqCst) {
            return Err(ControlError::Rejected {
                status: 400,
                detail: format!("{} refused", action),
            });
        }
        Ok(())
    }

    fn not_found(what: &str) -> ControlError {
        ControlError::Rejected {
            status: 404,
            detail: format!("{} not found", what),
        }
    }

    fn ack(&self, action: &str) -> Result<ActionResponse, ControlError> {
        self.record(action)?;
        Ok(ActionResponse {
            success: true,
            message: format!("{} ok", action),
        })
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn server_status(&self) -> Result<ServerStatus, ControlError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status_script.lock().pop_front();
        let server = match scripted {
            Some((delay, server)) => {
                tokio::time::sleep(delay).await;
                server
            }
            None => ServerStatus::default(),
        };
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ControlError::Connection("refused".to_string()));
        }
        Ok(server)
    }

    async fn client_status(&self) -> Result<ClientStatus, ControlError> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ControlError::Connection("refused".to_string()));
        }
        Ok(ClientStatus::default())
    }

    async fn server_events(&self, _limit: usize) -> Result<Vec<RawEvent>, ControlError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(ControlError::Timeout);
        }
        Ok(self.server_events.lock().clone())
    }

    async fn client_events(&self, _limit: usize) -> Result<Vec<RawEvent>, ControlError> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(ControlError::Timeout);
        }
        Ok(self.client_events.lock().clone())
    }

    async fn start_server(&self, _config: &ServerConfig) -> Result<ActionResponse, ControlError> {
        self.ack("start_server")
    }

    async fn stop_server(&self) -> Result<ActionResponse, ControlError> {
        self.ack("stop_server")
    }

    async fn configure_client(
        &self,
        _config: &ClientConfig,
    ) -> Result<ActionResponse, ControlError> {
        self.ack("configure_client")
    }

    async fn transfer_data(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferResponse, ControlError> {
        self.record("transfer_data")?;
        Ok(TransferResponse {
            success: true,
            message: "Transfer completed".to_string(),
            transfer_id: request.filename.clone(),
            stats: None,
        })
    }

    async fn transfer_file(&self, path: &Path) -> Result<TransferResponse, ControlError> {
        self.record("transfer_file")?;
        Ok(TransferResponse {
            success: true,
            message: "Transfer started".to_string(),
            transfer_id: path.display().to_string(),
            stats: None,
        })
    }

    async fn health(&self) -> Result<HealthReport, ControlError> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            timestamp: "2026-01-01T00:00:00".to_string(),
            server_running: false,
            client_state: ClientState::Idle,
        })
    }

    async fn reset_server(&self) -> Result<ActionResponse, ControlError> {
        self.ack("reset_server")
    }

    async fn close_client(&self) -> Result<ActionResponse, ControlError> {
        self.ack("close_client")
    }

    async fn transfers(&self) -> Result<Vec<TransferRecord>, ControlError> {
        Ok(self.transfers.lock().clone())
    }

    async fn transfer(&self, id: &str) -> Result<TransferRecord, ControlError> {
        self.transfers
            .lock()
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("Transfer"))
    }

    async fn download_report(&self, request: &ReportRequest) -> Result<Download, ControlError> {
        self.record("download_report")?;
        self.report_requests
            .lock()
            .push(("download".to_string(), request.clone()));
        Ok(Download {
            filename: Some(format!("transfer_report_{}.pdf", request.filename)),
            bytes: b"%PDF-1.4".to_vec(),
        })
    }

    async fn generate_report(&self, request: &ReportRequest) -> Result<Download, ControlError> {
        self.record("generate_report")?;
        self.report_requests
            .lock()
            .push(("generate".to_string(), request.clone()));
        Ok(Download {
            filename: None,
            bytes: b"%PDF-1.4".to_vec(),
        })
    }

    async fn received_files(&self) -> Result<Vec<ReceivedFile>, ControlError> {
        Ok(self.files.lock().iter().map(|(file, _)| file.clone()).collect())
    }

    async fn download_file(&self, name: &str) -> Result<Download, ControlError> {
        self.files
            .lock()
            .iter()
            .find(|(file, _)| file.name == name)
            .map(|(file, bytes)| Download {
                filename: Some(file.name.clone()),
                bytes: bytes.clone(),
            })
            .ok_or_else(|| Self::not_found("File"))
    }

    async fn run_demo(&self, request: &DemoRequest) -> Result<DemoResult, ControlError> {
        self.record("run_demo")?;
        self.demo_requests.lock().push(request.clone());
        Ok(DemoResult {
            success: true,
            protocol: Some(request.protocol),
            window_size: Some(request.window_size),
            packet_loss: Some(request.packet_loss),
            data_size: Some(request.data_size),
            client_stats: Some(ClientStats {
                packets_sent: Some(10),
                ..Default::default()
            }),
            server_stats: None,
        })
    }

    async fn protocols(&self) -> Result<Vec<ProtocolInfo>, ControlError> {
        Ok(ProtocolMode::ALL
            .into_iter()
            .map(|mode| ProtocolInfo {
                id: mode.as_str().to_string(),
                name: mode.label().to_string(),
                ..Default::default()
            })
            .collect())
    }
}
