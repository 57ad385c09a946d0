//! Four-counter transfer summary shown above the charts.

use serde::Serialize;

use rdtwatch_types::{ClientStatus, ServerStatus};

/// Aggregate packet counters for the current transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TransferSummary {
    /// Data packets sent by the client, retransmissions included.
    pub sent: u64,
    /// Data packets accepted by the server.
    pub received: u64,
    pub retransmissions: u64,
    /// Packets discarded by simulated loss on either end.
    pub dropped: u64,
}

impl TransferSummary {
    /// Derive the summary from the latest status snapshots.
    ///
    /// A counter missing from a snapshot contributes nothing to its total.
    pub fn from_status(server: &ServerStatus, client: &ClientStatus) -> Self {
        let client_stats = client.stats.as_ref();
        let server_stats = server.stats.as_ref();

        let sent = client_stats.and_then(|s| s.packets_sent).unwrap_or(0);
        let retransmissions = client_stats.and_then(|s| s.retransmissions).unwrap_or(0);
        let received = server_stats.and_then(|s| s.packets_received).unwrap_or(0);
        let dropped = client_stats.and_then(|s| s.packets_dropped).unwrap_or(0)
            + server_stats.and_then(|s| s.packets_dropped).unwrap_or(0);

        Self {
            sent,
            received,
            retransmissions,
            dropped,
        }
    }

    /// Share of sent packets that were not retransmissions, as a percentage.
    ///
    /// Defined as 100% before anything has been sent.
    pub fn efficiency(&self) -> f64 {
        if self.sent == 0 {
            return 100.0;
        }
        self.sent.saturating_sub(self.retransmissions) as f64 / self.sent as f64 * 100.0
    }
}
