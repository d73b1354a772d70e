//! Pairwise overlap detection across timed events.

use serde::Serialize;

use crate::cancel::Cancellation;
use crate::error::AgendaError;
use crate::model::{Calendar, Event, ScopedEvent};
use crate::query::{events_in_range, scope_calendars};
use crate::temporal::{BusySlot, DateRange};

/// Two events whose times overlap.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub first: ScopedEvent,
    pub second: ScopedEvent,
    /// The time both events claim.
    pub overlap: BusySlot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub total: usize,
    pub range: DateRange,
}

/// Report every overlapping pair of timed events starting in `range`.
///
/// Events are gathered in calendar order and compared for every index pair
/// `i < j`, so each unordered pair is reported at most once. An event that
/// overlaps three others produces three conflicts.
pub fn detect_conflicts(
    calendars: &[Calendar],
    range: &DateRange,
    calendar: Option<&str>,
    cancel: &Cancellation,
) -> Result<ConflictReport, AgendaError> {
    let scoped = scope_calendars(calendars, calendar)?;
    let timed: Vec<(&str, &Event)> = events_in_range(&scoped, range)
        .filter(|(_, e)| e.is_timed())
        .collect();

    let mut conflicts = Vec::new();
    for (i, (cal_a, a)) in timed.iter().enumerate() {
        cancel.check("detect_conflicts")?;
        let slot_a = a.busy_slot();
        for (cal_b, b) in &timed[i + 1..] {
            if let Some(overlap) = slot_a.intersection(&b.busy_slot()) {
                conflicts.push(Conflict {
                    first: ScopedEvent::new(*cal_a, (*a).clone()),
                    second: ScopedEvent::new(*cal_b, (*b).clone()),
                    overlap,
                });
            }
        }
    }

    tracing::debug!(
        events = timed.len(),
        conflicts = conflicts.len(),
        "conflict scan complete"
    );

    Ok(ConflictReport {
        total: conflicts.len(),
        conflicts,
        range: *range,
    })
}
