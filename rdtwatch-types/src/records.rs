//! Transfer history, received files, demo runs and protocol descriptions.

use crate::{ClientStats, ProtocolMode, ServerStats};

/// A finished file transfer, as kept in the control plane's history.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransferRecord {
    pub id: String,
    pub filename: String,
    /// Size of the uploaded file, in bytes.
    pub size: u64,
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub stats: Option<ClientStats>,
    /// ISO-8601 completion time on the control plane's clock.
    pub timestamp: String,
}

/// Body of `GET /api/transfers`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransfersResponse {
    pub transfers: Vec<TransferRecord>,
}

/// A file reassembled by the receiver.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReceivedFile {
    pub name: String,
    pub size: u64,
    /// ISO-8601 modification time.
    pub modified: String,
}

/// Body of `GET /api/files/received`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReceivedFilesResponse {
    pub files: Vec<ReceivedFile>,
}

/// Query of `POST /api/demo/run`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemoRequest {
    pub protocol: ProtocolMode,
    pub window_size: u32,
    pub packet_loss: f64,
    /// Bytes of random data to send.
    pub data_size: u64,
}

/// Outcome of a demo run: both ends' counters after one synchronous transfer.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DemoResult {
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub protocol: Option<ProtocolMode>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub window_size: Option<u32>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub packet_loss: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub data_size: Option<u64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub client_stats: Option<ClientStats>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub server_stats: Option<ServerStats>,
}

/// Query of the report endpoints.
///
/// `GET /api/report/download` only reads `filename` and `file_size`; it takes
/// the remaining parameters from the live client. `POST /api/report/generate`
/// uses all of them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportRequest {
    /// Name printed on the report.
    pub filename: String,
    /// Bytes transferred; zero lets the control plane use the sender's count.
    pub file_size: u64,
    pub protocol_mode: ProtocolMode,
    pub window_size: u32,
    pub packet_loss_rate: f64,
    pub congestion_enabled: bool,
}

/// Description of one reliability scheme offered by the control plane.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProtocolInfo {
    /// Wire name, e.g. `go_back_n`.
    pub id: String,
    pub name: String,
    pub description: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

impl ProtocolInfo {
    /// The mode this entry describes, if this schema knows it.
    pub fn mode(&self) -> Option<ProtocolMode> {
        self.id.parse().ok()
    }
}

/// Body of `GET /api/protocols`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProtocolsResponse {
    pub protocols: Vec<ProtocolInfo>,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_decode_transfer_history() {
        let json = r#"{"transfers": [{
            "id": "transfer_1700000000",
            "filename": "notes.txt",
            "size": 2048,
            "success": true,
            "stats": {"packets_sent": 3, "retransmissions": 0},
            "timestamp": "2026-01-01T12:00:00"
        }]}"#;

        let body: TransfersResponse = serde_json::from_str(json).unwrap();
        let record = &body.transfers[0];
        assert_eq!(record.id, "transfer_1700000000");
        assert_eq!(record.size, 2048);
        assert!(record.success);
        assert_eq!(record.stats.as_ref().and_then(|s| s.packets_sent), Some(3));
    }

    #[test]
    fn test_decode_demo_result() {
        let json = r#"{
            "success": true,
            "protocol": "go_back_n",
            "window_size": 8,
            "packet_loss": 0.1,
            "data_size": 10000,
            "client_stats": {"packets_sent": 12, "retransmissions": 2},
            "server_stats": {"packets_received": 10, "packets_dropped": 2}
        }"#;

        let result: DemoResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.protocol, Some(ProtocolMode::GoBackN));
        assert_eq!(result.server_stats.and_then(|s| s.packets_dropped), Some(2));
    }

    #[test]
    fn test_protocol_info_mode() {
        let body: ProtocolsResponse = serde_json::from_str(
            r#"{"protocols": [
                {"id": "stop_wait", "name": "Stop-and-Wait", "pros": ["Simple"], "cons": []},
                {"id": "tcp_reno", "name": "Reno"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(body.protocols[0].mode(), Some(ProtocolMode::StopWait));
        assert_eq!(body.protocols[0].pros, vec!["Simple".to_string()]);
        assert_eq!(body.protocols[1].mode(), None);
    }
}
