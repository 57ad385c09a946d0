//! Control requests sent to the transfer engine and their responses.

use core::fmt;
use core::str::FromStr;

use crate::{ClientState, ClientStats};

/// Reliability scheme used by both ends of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProtocolMode {
    /// One packet in flight; wait for its ACK before sending the next.
    StopWait,
    /// Sliding window with cumulative ACKs; a loss resends the whole window.
    GoBackN,
    /// Sliding window with per-packet ACKs and receiver-side buffering.
    #[default]
    SelectiveRepeat,
}

impl ProtocolMode {
    /// All modes, in the order they are usually presented.
    pub const ALL: [ProtocolMode; 3] = [
        ProtocolMode::StopWait,
        ProtocolMode::GoBackN,
        ProtocolMode::SelectiveRepeat,
    ];

    /// Returns the wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolMode::StopWait => "stop_wait",
            ProtocolMode::GoBackN => "go_back_n",
            ProtocolMode::SelectiveRepeat => "selective_repeat",
        }
    }

    /// Human readable name.
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolMode::StopWait => "Stop-and-Wait",
            ProtocolMode::GoBackN => "Go-Back-N",
            ProtocolMode::SelectiveRepeat => "Selective Repeat",
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown protocol mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolModeError(pub String);

impl fmt::Display for ParseProtocolModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown protocol mode '{}' (expected stop_wait, go_back_n or selective_repeat)",
            self.0
        )
    }
}

impl std::error::Error for ParseProtocolModeError {}

impl FromStr for ProtocolMode {
    type Err = ParseProtocolModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ParseProtocolModeError(s.to_string()))
    }
}

/// Body of `POST /api/server/start`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub packet_loss_rate: f64,
    pub protocol_mode: ProtocolMode,
    pub window_size: u32,
}

/// Body of `POST /api/client/configure`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    pub protocol_mode: ProtocolMode,
    pub window_size: u32,
    /// Base retransmission timeout, in seconds.
    pub timeout: f64,
    pub packet_loss_rate: f64,
    pub congestion_enabled: bool,
}

/// Body of `POST /api/client/transfer/data`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferRequest {
    pub filename: String,
    /// Payload to send, base64 encoded. When absent the engine generates test data.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub data_base64: Option<String>,
    pub protocol_mode: ProtocolMode,
    pub window_size: u32,
    pub packet_loss_rate: f64,
    pub congestion_enabled: bool,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Response to a transfer request.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransferResponse {
    pub success: bool,
    pub message: String,
    pub transfer_id: String,
    /// Final sender counters; only present for synchronous (raw data) transfers.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub stats: Option<ClientStats>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HealthReport {
    pub status: String,
    /// ISO-8601 timestamp on the control plane's clock.
    pub timestamp: String,
    pub server_running: bool,
    pub client_state: ClientState,
}
