//! Canonical view state and everything derived from it.
//!
//! ## Submodules
//!
//! - [`state`]: The [`ViewModel`] and the [`Reconciler`] that applies [`Update`]s to it
//! - [`history`]: Bounded throughput and congestion time series
//! - [`events`]: Merging the server and client event logs
//! - [`window`]: Projecting window parameters onto a slot viewport
//! - [`summary`]: Packet counters and efficiency
//!
//! ## Data Flow
//!
//! ```text
//! push frame ─┐
//! status poll ─┼──▶ Update ──▶ Reconciler::apply() ──▶ Arc<ViewModel>
//! event poll ─┤                    │
//! action ─────┘                    ├──▶ HistoryBuffer::push()   (push frames only)
//!                                  └──▶ merge_events()          (event polls only)
//!
//! Arc<ViewModel> ──▶ window_slots() / summary()   (on demand, pure)
//! ```

pub mod events;
pub mod history;
pub mod state;
pub mod summary;
pub mod window;

pub use events::{merge_events, EVENTS_PER_ORIGIN, MERGED_EVENT_CAPACITY};
pub use history::{
    sparkline, CongestionSample, HistoryBuffer, ThroughputSample, HISTORY_CAPACITY,
};
pub use state::{Reconciler, Update, ViewModel};
pub use summary::TransferSummary;
pub use window::{project, SlotStatus, SlotStrip, WindowSlot, WindowState};
