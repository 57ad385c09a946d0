//! The running dashboard: wires producers to the reconciler and exposes
//! operator actions.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use rdtwatch_types::{
    ActionResponse, DemoResult, HealthReport, ProtocolInfo, PushFrame, ReceivedFile,
    TransferRecord, TransferResponse,
};

use crate::config::TransferSettings;
use crate::data::{Reconciler, Update, ViewModel};
use crate::source::{
    ConnectionManager, ConnectionStatus, ControlError, ControlPlane, Download, FrameHandler,
    PollerHandle, PollerSet, PushTransport, ViewReceiver,
};

/// Filename reported for raw-data transfers.
const DATA_TRANSFER_FILENAME: &str = "data.bin";

/// Forwards push-channel traffic into the update queue.
struct UpdateForwarder {
    updates: mpsc::UnboundedSender<Update>,
}

impl FrameHandler for UpdateForwarder {
    fn handle_frame(&self, frame: PushFrame) -> anyhow::Result<()> {
        self.updates
            .send(Update::Frame(frame))
            .map_err(|_| anyhow::anyhow!("view model has shut down"))
    }

    fn status_changed(&self, status: ConnectionStatus) {
        let _ = self.updates.send(Update::Connection(status));
    }
}

/// A live dashboard session.
///
/// Created with [`Dashboard::start`], which opens the push channel and starts
/// both pollers. Every producer sends [`Update`]s into one queue drained by a
/// single task that owns the [`Reconciler`], so updates are applied one at a
/// time in arrival order.
pub struct Dashboard {
    settings: TransferSettings,
    control: Arc<dyn ControlPlane>,
    connection: ConnectionManager,
    updates: mpsc::UnboundedSender<Update>,
    pollers: Option<PollerHandle>,
    stop_tx: watch::Sender<bool>,
    reconciler: Option<JoinHandle<()>>,
    view: ViewReceiver,
}

impl Dashboard {
    /// Start a session. Must be called from within a tokio runtime.
    pub fn start(
        settings: TransferSettings,
        transport: Arc<dyn PushTransport>,
        control: Arc<dyn ControlPlane>,
    ) -> Self {
        let (reconciler, view) = Reconciler::new(u64::from(settings.window_size));
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let reconciler = tokio::spawn(run_reconciler(reconciler, updates_rx, stop_rx));

        let forwarder = Arc::new(UpdateForwarder {
            updates: updates.clone(),
        });
        let connection = ConnectionManager::new(transport, forwarder);
        connection.connect();

        let pollers = PollerSet::new(control.clone()).start(updates.clone());
        info!("dashboard started");

        Self {
            settings,
            control,
            connection,
            updates,
            pollers: Some(pollers),
            stop_tx,
            reconciler: Some(reconciler),
            view,
        }
    }

    /// A receiver for the published view model.
    pub fn view(&self) -> ViewReceiver {
        self.view.clone()
    }

    /// The most recently published view model.
    pub fn latest(&self) -> Arc<ViewModel> {
        self.view.latest()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Send a payload over the push channel; a no-op unless it is open.
    pub fn send<T: Serialize>(&self, payload: &T) {
        self.connection.send(payload);
    }

    /// Start the receiver with the configured parameters.
    ///
    /// The server is shown as running only once the request succeeds.
    pub async fn start_server(&self) -> Result<ActionResponse, ControlError> {
        self.settings.validate()?;
        let response = self
            .control
            .start_server(&self.settings.server_config())
            .await?;
        if response.success {
            self.push(Update::ServerRunning(true));
        }
        Ok(response)
    }

    pub async fn stop_server(&self) -> Result<ActionResponse, ControlError> {
        let response = self.control.stop_server().await?;
        if response.success {
            self.push(Update::ServerRunning(false));
        }
        Ok(response)
    }

    /// Configure the sender. On success the configured window size becomes
    /// the fallback for frames that omit one.
    pub async fn configure_client(&self) -> Result<ActionResponse, ControlError> {
        self.settings.validate()?;
        let response = self
            .control
            .configure_client(&self.settings.client_config())
            .await?;
        if response.success {
            self.push(Update::WindowConfigured(u64::from(self.settings.window_size)));
        }
        Ok(response)
    }

    /// Transfer raw bytes, or generated test data when `data` is `None`.
    ///
    /// Chart history is cleared before the request goes out and put back if
    /// the request fails. Resolves once the control plane reports the
    /// transfer finished.
    pub async fn start_transfer_data(
        &self,
        data: Option<&[u8]>,
    ) -> Result<TransferResponse, ControlError> {
        self.settings.validate()?;
        let request = self
            .settings
            .transfer_request(DATA_TRANSFER_FILENAME, data.map(|bytes| STANDARD.encode(bytes)));

        self.transfer(self.control.transfer_data(&request)).await
    }

    /// Upload `path` and start transferring it.
    ///
    /// Chart history is cleared before the upload starts and put back if it
    /// fails. Resolves once the transfer has been started; its outcome is
    /// later listed by [`transfers`](Self::transfers).
    pub async fn start_transfer_file(&self, path: &Path) -> Result<TransferResponse, ControlError> {
        self.settings.validate()?;
        self.transfer(self.control.transfer_file(path)).await
    }

    /// Run a demo transfer of `data_size` random bytes with the configured
    /// parameters. The control plane starts the receiver first if needed.
    pub async fn run_demo(&self, data_size: u64) -> Result<DemoResult, ControlError> {
        self.settings.validate()?;
        if data_size == 0 {
            return Err(ControlError::Invalid(
                "data_size must be greater than zero".to_string(),
            ));
        }
        let request = self.settings.demo_request(data_size);
        let result = self.transfer(self.control.run_demo(&request)).await?;
        self.push(Update::ServerRunning(true));
        Ok(result)
    }

    /// Clear the receiver's per-transfer state.
    pub async fn reset_server(&self) -> Result<ActionResponse, ControlError> {
        self.control.reset_server().await
    }

    pub async fn close_client(&self) -> Result<ActionResponse, ControlError> {
        self.control.close_client().await
    }

    pub async fn transfers(&self) -> Result<Vec<TransferRecord>, ControlError> {
        self.control.transfers().await
    }

    pub async fn transfer_record(&self, id: &str) -> Result<TransferRecord, ControlError> {
        self.control.transfer(id).await
    }

    /// PDF report of the live counters, labelled with `filename`.
    pub async fn download_report(
        &self,
        filename: &str,
        file_size: u64,
    ) -> Result<Download, ControlError> {
        let request = self.settings.report_request(filename, file_size);
        self.control.download_report(&request).await
    }

    /// PDF report of the live counters, described with the configured
    /// transfer parameters.
    pub async fn generate_report(
        &self,
        filename: &str,
        file_size: u64,
    ) -> Result<Download, ControlError> {
        self.settings.validate()?;
        let request = self.settings.report_request(filename, file_size);
        self.control.generate_report(&request).await
    }

    pub async fn received_files(&self) -> Result<Vec<ReceivedFile>, ControlError> {
        self.control.received_files().await
    }

    pub async fn download_file(&self, name: &str) -> Result<Download, ControlError> {
        self.control.download_file(name).await
    }

    pub async fn protocols(&self) -> Result<Vec<ProtocolInfo>, ControlError> {
        self.control.protocols().await
    }

    pub async fn health(&self) -> Result<HealthReport, ControlError> {
        self.control.health().await
    }

    /// Build the JSON export of the current view.
    pub fn export_json(&self) -> serde_json::Value {
        export_view(&self.latest())
    }

    /// Write the current view to `path` as pretty JSON.
    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let json = serde_json::to_string_pretty(&self.export_json())?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Stop the pollers, close the push channel, and stop applying updates.
    ///
    /// Requests already in flight may still resolve; whatever they deliver is
    /// dropped. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.begin_shutdown();
        if let Some(reconciler) = self.reconciler.take() {
            let _ = reconciler.await;
            info!("dashboard stopped");
        }
    }

    fn begin_shutdown(&mut self) {
        if let Some(pollers) = self.pollers.take() {
            pollers.stop();
        }
        self.connection.disconnect();
        let _ = self.stop_tx.send(true);
    }

    /// Clear history, run `request`, and restore history if it fails.
    async fn transfer<T>(
        &self,
        request: impl Future<Output = Result<T, ControlError>>,
    ) -> Result<T, ControlError> {
        self.push(Update::TransferStarted);
        let result = request.await;
        if result.is_err() {
            self.push(Update::TransferFailed);
        }
        result
    }

    fn push(&self, update: Update) {
        if self.updates.send(update).is_err() {
            debug!("dashboard stopped, dropping operator update");
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.begin_shutdown();
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("connection", &self.connection)
            .field("control", &self.control)
            .field("running", &self.reconciler.is_some())
            .finish()
    }
}

/// Drain the update queue until told to stop, then tear the state down.
async fn run_reconciler(
    mut reconciler: Reconciler,
    mut updates: mpsc::UnboundedReceiver<Update>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            update = updates.recv() => match update {
                Some(update) => {
                    reconciler.apply(update);
                }
                None => break,
            },
        }
    }

    updates.close();
    reconciler.tear_down();
}

/// Export structure: the view model plus derived summary and window viewport.
pub fn export_view(view: &ViewModel) -> serde_json::Value {
    let summary = view.summary();
    serde_json::json!({
        "connected": view.connected(),
        "connection": view.connection,
        "summary": {
            "sent": summary.sent,
            "received": summary.received,
            "retransmissions": summary.retransmissions,
            "dropped": summary.dropped,
            "efficiency": summary.efficiency(),
        },
        "server": view.server,
        "client": view.client,
        "window": view.window.map(|window| serde_json::json!({
            "base": window.base,
            "next_seq": window.next_seq,
            "window_size": window.window_size,
            "total_chunks": window.total_chunks,
            "slots": window.slots(),
        })),
        "configured_window_size": view.configured_window_size,
        "throughput_history": view.throughput_history,
        "congestion_history": view.congestion_history,
        "events": view.events,
    })
}
