//! # rdtwatch
//!
//! Live state synchronization for a reliable-data-transfer control plane.
//!
//! This crate keeps one consistent view of a running transfer engine by
//! combining two independent inputs: `stats_update` frames pushed over a
//! WebSocket, and status/event snapshots pulled over HTTP on fixed intervals.
//! From that view it derives bounded chart histories, a merged event log, a
//! sliding-window viewport and a transfer summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Dashboard                             │
//! │                                                                  │
//! │  ┌──────────────────┐                                            │
//! │  │ ConnectionManager│──┐                                         │
//! │  │  (push, 3000 ms) │  │    ┌────────────┐      ┌─────────────┐  │
//! │  └──────────────────┘  ├───▶│ Reconciler │─────▶│ ViewReceiver│  │
//! │  ┌──────────────────┐  │    │  (single)  │ Arc  │  (watch)    │  │
//! │  │    PollerSet     │──┤    └────────────┘      └─────────────┘  │
//! │  │ (2000 / 500 ms)  │  │          │                              │
//! │  └──────────────────┘  │          ├──▶ HistoryBuffer ×2          │
//! │  operator actions ─────┘          ├──▶ merge_events              │
//! │                                   └──▶ project (on demand)       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: The push channel ([`ConnectionManager`] over a
//!   [`PushTransport`]), the pull pollers ([`PollerSet`] over a
//!   [`ControlPlane`]) and their WebSocket and HTTP implementations
//! - **[`data`]**: The [`ViewModel`], the [`Reconciler`] that applies
//!   updates to it, and the pure derivations (history, events, window, summary)
//! - **[`app`]**: [`Dashboard`], which wires everything together and exposes
//!   the operator actions
//! - **[`config`]**: Layered [`Settings`]
//!
//! ## Usage
//!
//! ### Watching a control plane
//!
//! ```no_run
//! use std::sync::Arc;
//! use rdtwatch::{Dashboard, HttpControlPlane, Settings, WebSocketTransport};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let transport = Arc::new(WebSocketTransport::new(&settings.ws_url).unwrap());
//! let control = Arc::new(
//!     HttpControlPlane::builder()
//!         .endpoint(settings.api_url.clone())
//!         .timeout(settings.request_timeout())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let dashboard = Dashboard::start(settings.transfer.clone(), transport, control);
//! let mut view = dashboard.view();
//! while let Some(latest) = view.changed().await {
//!     println!("efficiency {:.1}%", latest.summary().efficiency());
//! }
//! # });
//! ```
//!
//! ### Projecting a window
//!
//! ```
//! use rdtwatch::{project, SlotStrip};
//!
//! let slots = project(10, 14, 8, 100);
//! assert_eq!(SlotStrip(&slots).to_string(), "###>>>>....xxxxx");
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod source;

// Re-export main types for convenience
pub use app::Dashboard;
pub use config::{Settings, TransferSettings};
pub use data::{
    merge_events, project, sparkline, HistoryBuffer, Reconciler, SlotStatus, SlotStrip,
    TransferSummary, Update, ViewModel, WindowSlot, WindowState,
};
pub use source::{
    ConnectionManager, ConnectionStatus, ControlError, ControlPlane, Download, HttpControlPlane,
    PollerSet, PushTransport, TransportError, ViewReceiver, WebSocketTransport,
};
