//! Event log entries reported by either end of a transfer.

use core::fmt;

/// One entry of an engine's event log, as served by the events endpoints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawEvent {
    /// Unix time in fractional seconds.
    pub timestamp: f64,
    /// Event kind, e.g. `syn_sent`, `packet_sent`, `timeout`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub event_type: String,
    pub message: String,
}

/// Body of `GET /api/{server,client}/events`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventsResponse {
    pub events: Vec<RawEvent>,
}

/// Which end of the transfer reported an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventOrigin {
    Server,
    Client,
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventOrigin::Server => f.write_str("server"),
            EventOrigin::Client => f.write_str("client"),
        }
    }
}

/// An event tagged with the origin that reported it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub timestamp: f64,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub event_type: String,
    pub message: String,
    pub source: EventOrigin,
}

impl Event {
    /// Tag a raw event with its origin.
    pub fn from_raw(raw: RawEvent, source: EventOrigin) -> Self {
        Self {
            timestamp: raw.timestamp,
            event_type: raw.event_type,
            message: raw.message,
            source,
        }
    }
}
