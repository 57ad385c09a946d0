//! Sliding-window viewport derived from the sender's window parameters.

use std::fmt;

use serde::Serialize;

/// Sequence numbers shown before the window base.
const LEADING_SLOTS: u64 = 3;

/// Sequence numbers shown past the end of the window.
const TRAILING_SLOTS: u64 = 5;

/// Window parameters last reported by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowState {
    /// Oldest unacknowledged sequence number.
    pub base: u64,
    /// Next sequence number to send.
    pub next_seq: u64,
    pub window_size: u64,
    /// Chunks in the transfer; zero when unknown.
    pub total_chunks: u64,
}

impl WindowState {
    /// Compute the viewport for this window.
    pub fn slots(&self) -> Vec<WindowSlot> {
        project(self.base, self.next_seq, self.window_size, self.total_chunks)
    }
}

/// Display status of one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotStatus {
    /// Below the base: acknowledged.
    Acked,
    /// Sent, awaiting acknowledgement.
    InFlight,
    /// Inside the window but not yet sent.
    Available,
    /// Beyond the window.
    Blocked,
}

impl SlotStatus {
    /// One-character glyph for compact text rendering.
    pub fn glyph(&self) -> char {
        match self {
            SlotStatus::Acked => '#',
            SlotStatus::InFlight => '>',
            SlotStatus::Available => '.',
            SlotStatus::Blocked => 'x',
        }
    }
}

/// A sequence number and its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSlot {
    pub sequence_number: u64,
    pub status: SlotStatus,
}

/// Project the window onto a bounded, ascending run of slots.
///
/// The viewport spans `[max(0, base - 3), end)` where `end` is
/// `base + window_size + 5`, clamped to `total_chunks` when that is non-zero.
/// Classification (first match wins): below `base` is acked, below `next_seq`
/// is in flight, below `base + window_size` is available, otherwise blocked.
pub fn project(base: u64, next_seq: u64, window_size: u64, total_chunks: u64) -> Vec<WindowSlot> {
    let window_end = base.saturating_add(window_size);
    let viewport_end = window_end.saturating_add(TRAILING_SLOTS);
    let end = if total_chunks > 0 {
        total_chunks.min(viewport_end)
    } else {
        viewport_end
    };
    let start = base.saturating_sub(LEADING_SLOTS);

    (start..end)
        .map(|sequence_number| {
            let status = if sequence_number < base {
                SlotStatus::Acked
            } else if sequence_number < next_seq {
                SlotStatus::InFlight
            } else if sequence_number < window_end {
                SlotStatus::Available
            } else {
                SlotStatus::Blocked
            };
            WindowSlot {
                sequence_number,
                status,
            }
        })
        .collect()
}

/// Renders slots as glyphs, e.g. `###>>>...xxxxx`.
pub struct SlotStrip<'a>(pub &'a [WindowSlot]);

impl fmt::Display for SlotStrip<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in self.0 {
            write!(f, "{}", slot.status.glyph())?;
        }
        Ok(())
    }
}
