//! Inbound and outbound plumbing to the transfer control plane.
//!
//! Two independent producers feed the view model:
//!
//! - the push channel ([`ConnectionManager`] over a [`PushTransport`]), which
//!   delivers `stats_update` frames as the control plane broadcasts them
//! - the pull pollers ([`PollerSet`] over a [`ControlPlane`]), which fetch
//!   status snapshots and event logs on fixed intervals
//!
//! Both traits exist so the timing and failure behavior can be exercised
//! against in-memory fakes; [`WebSocketTransport`] and [`HttpControlPlane`]
//! are the real implementations.

mod channel;
mod connection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod http;
mod poller;
mod websocket;

pub use channel::ViewReceiver;
pub use connection::{ConnectionManager, ConnectionStatus, FrameHandler, RECONNECT_DELAY};
pub use error::{ControlError, TransportError};
pub use http::{HttpControlPlane, HttpControlPlaneBuilder};
pub use poller::{PollerHandle, PollerSet, EVENT_POLL_INTERVAL, STATUS_POLL_INTERVAL};
pub use websocket::WebSocketTransport;

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use rdtwatch_types::{
    ActionResponse, ClientConfig, ClientStatus, DemoRequest, DemoResult, HealthReport,
    ProtocolInfo, RawEvent, ReceivedFile, ReportRequest, ServerConfig, ServerStatus,
    TransferRecord, TransferRequest, TransferResponse,
};

/// An open push channel: text frames in, text frames out.
///
/// The channel is closed from the remote side when `inbound` yields `None`,
/// and from the local side by dropping `outbound`.
#[derive(Debug)]
pub struct PushChannel {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::UnboundedSender<String>,
}

/// A binary document served by the control plane (a report or a received file).
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    /// Name suggested by the control plane, if it sent one.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Something that can open a push channel to the control plane.
#[async_trait]
pub trait PushTransport: Send + Sync + Debug {
    /// Establish a new channel.
    async fn open(&self) -> Result<PushChannel, TransportError>;

    /// Returns a human-readable description of the endpoint.
    fn description(&self) -> &str;
}

/// Request/response access to the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync + Debug {
    async fn server_status(&self) -> Result<ServerStatus, ControlError>;

    async fn client_status(&self) -> Result<ClientStatus, ControlError>;

    /// The most recent `limit` server events.
    async fn server_events(&self, limit: usize) -> Result<Vec<RawEvent>, ControlError>;

    /// The most recent `limit` client events.
    async fn client_events(&self, limit: usize) -> Result<Vec<RawEvent>, ControlError>;

    async fn start_server(&self, config: &ServerConfig) -> Result<ActionResponse, ControlError>;

    async fn stop_server(&self) -> Result<ActionResponse, ControlError>;

    async fn configure_client(&self, config: &ClientConfig)
        -> Result<ActionResponse, ControlError>;

    /// Send raw data; resolves when the transfer has finished.
    async fn transfer_data(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferResponse, ControlError>;

    /// Upload a file; resolves once the transfer has been started.
    async fn transfer_file(&self, path: &Path) -> Result<TransferResponse, ControlError>;

    async fn health(&self) -> Result<HealthReport, ControlError>;

    /// Clear the receiver's per-transfer state, including its current peer.
    async fn reset_server(&self) -> Result<ActionResponse, ControlError>;

    async fn close_client(&self) -> Result<ActionResponse, ControlError>;

    /// Finished file transfers, oldest first.
    async fn transfers(&self) -> Result<Vec<TransferRecord>, ControlError>;

    async fn transfer(&self, id: &str) -> Result<TransferRecord, ControlError>;

    /// PDF report of the live counters. Only `filename` and `file_size` of the
    /// request are sent.
    async fn download_report(&self, request: &ReportRequest) -> Result<Download, ControlError>;

    /// PDF report with explicit transfer parameters.
    async fn generate_report(&self, request: &ReportRequest) -> Result<Download, ControlError>;

    async fn received_files(&self) -> Result<Vec<ReceivedFile>, ControlError>;

    async fn download_file(&self, name: &str) -> Result<Download, ControlError>;

    /// Start a receiver if needed and run one synchronous transfer of random data.
    async fn run_demo(&self, request: &DemoRequest) -> Result<DemoResult, ControlError>;

    async fn protocols(&self) -> Result<Vec<ProtocolInfo>, ControlError>;
}
