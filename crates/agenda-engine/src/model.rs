//! In-memory event and calendar model.
//!
//! These are request-scoped copies of what the calendar store holds. The
//! store owns their lifecycle; this crate only reads them for analysis and
//! assembles new ones for write-back.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::recurrence::Recurrence;
use crate::temporal::{minutes_between, BusySlot};

/// A single calendar event. `start <= end` always holds for events handed
/// out by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// All-day events ignore time of day and never take part in conflict
    /// or free-time computation.
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Minutes before start at which a reminder fires.
    #[serde(default)]
    pub reminders: Vec<u32>,
}

impl Event {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            all_day: false,
            location: None,
            notes: None,
            url: None,
            recurrence: None,
            attendees: Vec::new(),
            reminders: Vec::new(),
        }
    }

    pub fn all_day(mut self) -> Self {
        self.all_day = true;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn with_attendee(mut self, attendee: Attendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    pub fn with_reminder(mut self, minutes_before: u32) -> Self {
        self.reminders.push(minutes_before);
        self
    }

    pub fn is_timed(&self) -> bool {
        !self.all_day
    }

    /// The event's occupied time as a half-open slot.
    pub fn busy_slot(&self) -> BusySlot {
        BusySlot::new(self.start, self.end)
    }

    /// Whole minutes from start to end.
    pub fn duration_minutes(&self) -> i64 {
        minutes_between(self.start, self.end)
    }

    /// Local hour (0-23) the event starts in.
    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }
}

/// An invitee and their response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    #[serde(default)]
    pub status: ParticipationStatus,
}

impl Attendee {
    pub fn new(name: impl Into<String>, status: ParticipationStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    #[default]
    Unknown,
    Pending,
    Accepted,
    Declined,
    Tentative,
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipationStatus::Unknown => "unknown",
            ParticipationStatus::Pending => "pending",
            ParticipationStatus::Accepted => "accepted",
            ParticipationStatus::Declined => "declined",
            ParticipationStatus::Tentative => "tentative",
        };
        f.write_str(s)
    }
}

/// A named container of events. Names are unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub name: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Calendar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }
}

/// An event tagged with the calendar it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedEvent {
    pub calendar: String,
    #[serde(flatten)]
    pub event: Event,
}

impl ScopedEvent {
    pub fn new(calendar: impl Into<String>, event: Event) -> Self {
        Self {
            calendar: calendar.into(),
            event,
        }
    }
}
