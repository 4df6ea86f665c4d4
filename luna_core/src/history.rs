//! Ad-hoc views over the raw event log.
//!
//! Some event kinds (audio reflections, fuel logs, exports) have no
//! dedicated state fields; views read them straight from the log through
//! these helpers.

use crate::types::{CheckinPayload, EventKind, EventType, HealthEvent};
use chrono::{DateTime, Utc};

/// All events of a type, in storage order
pub fn events_of_type<'a>(
    log: &'a [HealthEvent],
    event_type: &'a EventType,
) -> impl Iterator<Item = &'a HealthEvent> + 'a {
    log.iter().filter(move |e| &e.event_type == event_type)
}

/// The `limit` most recent events, optionally filtered by type
///
/// Sorted newest first by timestamp; events sharing a timestamp keep their
/// reverse storage order.
pub fn recent_events<'a>(
    log: &'a [HealthEvent],
    event_type: Option<&EventType>,
    limit: usize,
) -> Vec<&'a HealthEvent> {
    let mut events: Vec<&HealthEvent> = log
        .iter()
        .filter(|e| event_type.map_or(true, |t| &e.event_type == t))
        .collect();
    events.reverse();
    // Stable sort keeps reverse storage order for ties
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

/// The most recent event of a type
pub fn last_event_of_type<'a>(
    log: &'a [HealthEvent],
    event_type: &EventType,
) -> Option<&'a HealthEvent> {
    recent_events(log, Some(event_type), 1).into_iter().next()
}

/// The `limit` most recent check-ins with their timestamps, newest first
///
/// Check-ins with unreadable payloads are skipped.
pub fn recent_checkins(log: &[HealthEvent], limit: usize) -> Vec<(DateTime<Utc>, CheckinPayload)> {
    recent_events(log, Some(&EventType::DailyCheckin), usize::MAX)
        .into_iter()
        .filter_map(|e| match e.kind() {
            EventKind::DailyCheckin(checkin) => Some((e.timestamp, checkin)),
            _ => {
                tracing::warn!("Skipping unreadable check-in {}", e.id);
                None
            }
        })
        .take(limit)
        .collect()
}
