//! Frames delivered over the push channel.

use crate::{ClientStatus, ServerStatus};

/// A decoded push-channel frame, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum PushFrame {
    /// Periodic status broadcast from the control plane.
    StatsUpdate(StatsUpdate),
    /// A frame type this schema does not know about.
    #[cfg_attr(feature = "serde", serde(other))]
    Unknown,
}

/// Payload of a `stats_update` frame.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatsUpdate {
    /// Unix time in fractional seconds on the control plane's clock.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub timestamp: Option<f64>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub server: Option<ServerStatus>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub client: Option<ClientStatus>,
}
