//! Merging of the server and client event logs into one display list.

use rdtwatch_types::{Event, EventOrigin, RawEvent};

/// Maximum number of events requested from each origin per poll.
pub const EVENTS_PER_ORIGIN: usize = 50;

/// Maximum number of events kept in the merged list.
pub const MERGED_EVENT_CAPACITY: usize = 100;

/// Tag, combine, and order the two event logs.
///
/// Server events come first, then client events; the concatenation is
/// stable-sorted newest first and cut to [`MERGED_EVENT_CAPACITY`]. Events are
/// not deduplicated, so the same occurrence reported by both ends shows up
/// twice. The result replaces the previous list outright.
pub fn merge_events(server: Vec<RawEvent>, client: Vec<RawEvent>) -> Vec<Event> {
    let mut merged: Vec<Event> = server
        .into_iter()
        .map(|e| Event::from_raw(e, EventOrigin::Server))
        .chain(client.into_iter().map(|e| Event::from_raw(e, EventOrigin::Client)))
        .collect();

    // `sort_by` is stable; equal timestamps keep server-before-client order.
    merged.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
    merged.truncate(MERGED_EVENT_CAPACITY);
    merged
}
