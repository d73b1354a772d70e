//! The calendar store contract and an in-memory implementation.
//!
//! Every engine operation reads a snapshot through [`CalendarStore::read`]
//! and mutates only through [`CalendarStore::write`] with a structured
//! [`WriteRequest`]. Stores never receive free-form command text.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::model::{Attendee, Calendar, Event, ParticipationStatus};
use crate::recurrence::Recurrence;
use crate::temporal::{next_midnight, start_of_day, DateRange};

// ── Contract ────────────────────────────────────────────────────────────────

/// Read parameters: one calendar or all of them, events whose start lies in
/// `range` (closed).
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub calendar: Option<String>,
    pub range: DateRange,
}

impl ReadRequest {
    pub fn new(calendar: Option<&str>, range: DateRange) -> Self {
        Self {
            calendar: calendar.map(str::to_string),
            range,
        }
    }
}

/// Identifies an existing event for a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLocator {
    pub calendar: String,
    /// Case-insensitive substring of the title.
    pub title: String,
    /// When set, the event must start on this day: `[00:00, next 00:00)`.
    pub on_date: Option<NaiveDate>,
}

impl EventLocator {
    pub fn new(calendar: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            calendar: calendar.into(),
            title: title.into(),
            on_date: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.on_date = Some(date);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !event
            .title
            .to_lowercase()
            .contains(&self.title.to_lowercase())
        {
            return false;
        }
        match self.on_date {
            Some(date) => {
                event.start >= start_of_day(date) && event.start < next_midnight(date)
            }
            None => true,
        }
    }

    fn describe(&self) -> String {
        match self.on_date {
            Some(date) => format!("'{}' in '{}' on {date}", self.title, self.calendar),
            None => format!("'{}' in '{}'", self.title, self.calendar),
        }
    }
}

/// Fields for a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    /// Invitee email addresses.
    pub attendees: Vec<String>,
    /// Minutes before start for a single reminder.
    pub alert_minutes: Option<u32>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            all_day: false,
            location: None,
            notes: None,
            url: None,
            attendees: Vec::new(),
            alert_minutes: None,
        }
    }

    pub fn into_event(self) -> Event {
        Event {
            title: self.title,
            start: self.start,
            end: self.end,
            all_day: self.all_day,
            location: self.location,
            notes: self.notes,
            url: self.url,
            recurrence: None,
            attendees: self
                .attendees
                .into_iter()
                .map(|email| Attendee::new(email, ParticipationStatus::Pending))
                .collect(),
            reminders: self.alert_minutes.into_iter().collect(),
        }
    }
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self == &EventPatch::default()
    }

    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(start) = self.start {
            event.start = start;
        }
        if let Some(end) = self.end {
            event.end = end;
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(notes) = &self.notes {
            event.notes = Some(notes.clone());
        }
        if let Some(url) = &self.url {
            event.url = Some(url.clone());
        }
    }
}

/// A structured mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    CreateEvent {
        calendar: String,
        draft: EventDraft,
    },
    CreateRecurringSeries {
        calendar: String,
        draft: EventDraft,
        recurrence: Recurrence,
    },
    UpdateEvent {
        target: EventLocator,
        patch: EventPatch,
    },
    /// Without `new_end` the event keeps its duration.
    MoveEvent {
        target: EventLocator,
        new_start: NaiveDateTime,
        new_end: Option<NaiveDateTime>,
    },
    /// Removes the whole series for a recurring event; `all_occurrences`
    /// is recorded for stores that can split series.
    DeleteEvent {
        target: EventLocator,
        all_occurrences: bool,
    },
    SetReminders {
        target: EventLocator,
        minutes: Vec<u32>,
        clear_existing: bool,
    },
}

impl WriteRequest {
    pub fn calendar(&self) -> &str {
        match self {
            WriteRequest::CreateEvent { calendar, .. }
            | WriteRequest::CreateRecurringSeries { calendar, .. } => calendar,
            WriteRequest::UpdateEvent { target, .. }
            | WriteRequest::MoveEvent { target, .. }
            | WriteRequest::DeleteEvent { target, .. }
            | WriteRequest::SetReminders { target, .. } => &target.calendar,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            WriteRequest::CreateEvent { .. } => "create_event",
            WriteRequest::CreateRecurringSeries { .. } => "create_recurring_event",
            WriteRequest::UpdateEvent { .. } => "update_event",
            WriteRequest::MoveEvent { .. } => "move_event",
            WriteRequest::DeleteEvent { .. } => "delete_event",
            WriteRequest::SetReminders { .. } => "manage_reminders",
        }
    }
}

/// What a write changed. `before` is absent for creates, `after` for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub calendar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Event>,
}

/// The external calendar system.
///
/// Implementations report their own failures as
/// [`AgendaError::CollaboratorFailure`] or
/// [`AgendaError::CollaboratorTimeout`]; callers add operation context.
pub trait CalendarStore {
    fn calendar_names(&self) -> Result<Vec<String>>;

    /// Calendars in store order, each holding only the events whose start
    /// lies in the request range. Fails with `CalendarNotFound` for an
    /// unknown name.
    fn read(&self, request: &ReadRequest) -> Result<Vec<Calendar>>;

    fn count_events(&self, calendar: &str) -> Result<usize>;

    fn write(&mut self, request: &WriteRequest) -> Result<WriteReceipt>;
}

// ── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    calendars: Vec<Calendar>,
}

/// A store backed by an in-process list of calendars, persisted as a JSON
/// snapshot `{"calendars": [...]}`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    calendars: Vec<Calendar>,
}

impl MemoryStore {
    /// # Errors
    ///
    /// Returns [`AgendaError::InvalidRequest`] for duplicate calendar names
    /// or an event ending before it starts.
    pub fn from_calendars(calendars: Vec<Calendar>) -> Result<Self> {
        for (i, calendar) in calendars.iter().enumerate() {
            if calendars[..i].iter().any(|c| c.name == calendar.name) {
                return Err(AgendaError::InvalidRequest(format!(
                    "duplicate calendar name '{}'",
                    calendar.name
                )));
            }
            if let Some(bad) = calendar.events.iter().find(|e| e.end < e.start) {
                return Err(AgendaError::InvalidRequest(format!(
                    "event '{}' in '{}' ends before it starts",
                    bad.title, calendar.name
                )));
            }
        }
        Ok(Self { calendars })
    }

    /// Load a JSON snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgendaError::CollaboratorFailure(format!("cannot read {}: {e}", path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
            AgendaError::CollaboratorFailure(format!("malformed snapshot {}: {e}", path.display()))
        })?;
        tracing::debug!(
            path = %path.display(),
            calendars = snapshot.calendars.len(),
            "loaded calendar snapshot"
        );
        Self::from_calendars(snapshot.calendars)
    }

    /// Write the current state back as a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            calendars: self.calendars.clone(),
        };
        let text = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| AgendaError::CollaboratorFailure(format!("cannot encode snapshot: {e}")))?;
        std::fs::write(path, text).map_err(|e| {
            AgendaError::CollaboratorFailure(format!("cannot write {}: {e}", path.display()))
        })
    }

    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    fn calendar_index(&self, name: &str) -> Result<usize> {
        self.calendars
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| AgendaError::CalendarNotFound(format!("'{name}'")))
    }

    /// `(calendar index, event index)` of the first event the locator matches.
    fn locate(&self, target: &EventLocator) -> Result<(usize, usize)> {
        let cal = self.calendar_index(&target.calendar)?;
        self.calendars[cal]
            .events
            .iter()
            .position(|e| target.matches(e))
            .map(|ev| (cal, ev))
            .ok_or_else(|| AgendaError::EventNotFound(target.describe()))
    }

    fn insert(&mut self, calendar: &str, event: Event) -> Result<WriteReceipt> {
        check_order(&event)?;
        let cal = self.calendar_index(calendar)?;
        self.calendars[cal].events.push(event.clone());
        Ok(WriteReceipt {
            calendar: calendar.to_string(),
            before: None,
            after: Some(event),
        })
    }

    /// Apply `change` to a copy of the located event and commit it only if
    /// the result is still well-ordered.
    fn modify(
        &mut self,
        target: &EventLocator,
        change: impl FnOnce(&mut Event),
    ) -> Result<WriteReceipt> {
        let (cal, ev) = self.locate(target)?;
        let before = self.calendars[cal].events[ev].clone();
        let mut after = before.clone();
        change(&mut after);
        check_order(&after)?;
        self.calendars[cal].events[ev] = after.clone();
        Ok(WriteReceipt {
            calendar: target.calendar.clone(),
            before: Some(before),
            after: Some(after),
        })
    }
}

fn check_order(event: &Event) -> Result<()> {
    if event.end < event.start {
        return Err(AgendaError::InvalidRequest(format!(
            "event '{}' would end ({}) before it starts ({})",
            event.title, event.end, event.start
        )));
    }
    Ok(())
}

impl CalendarStore for MemoryStore {
    fn calendar_names(&self) -> Result<Vec<String>> {
        Ok(self.calendars.iter().map(|c| c.name.clone()).collect())
    }

    fn read(&self, request: &ReadRequest) -> Result<Vec<Calendar>> {
        let selected: Vec<&Calendar> = match &request.calendar {
            Some(name) => vec![&self.calendars[self.calendar_index(name)?]],
            None => self.calendars.iter().collect(),
        };
        Ok(selected
            .into_iter()
            .map(|c| Calendar {
                name: c.name.clone(),
                events: c
                    .events
                    .iter()
                    .filter(|e| request.range.contains(e.start))
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    fn count_events(&self, calendar: &str) -> Result<usize> {
        let cal = self.calendar_index(calendar)?;
        Ok(self.calendars[cal].events.len())
    }

    fn write(&mut self, request: &WriteRequest) -> Result<WriteReceipt> {
        let receipt = match request {
            WriteRequest::CreateEvent { calendar, draft } => {
                self.insert(calendar, draft.clone().into_event())?
            }
            WriteRequest::CreateRecurringSeries {
                calendar,
                draft,
                recurrence,
            } => self.insert(
                calendar,
                draft.clone().into_event().with_recurrence(recurrence.clone()),
            )?,
            WriteRequest::UpdateEvent { target, patch } => {
                self.modify(target, |event| patch.apply(event))?
            }
            WriteRequest::MoveEvent {
                target,
                new_start,
                new_end,
            } => self.modify(target, |event| {
                let length = event.end - event.start;
                event.start = *new_start;
                event.end = new_end.unwrap_or(*new_start + length);
            })?,
            WriteRequest::DeleteEvent {
                target,
                all_occurrences,
            } => {
                let (cal, ev) = self.locate(target)?;
                let removed = self.calendars[cal].events.remove(ev);
                tracing::debug!(
                    title = %removed.title,
                    recurring = removed.recurrence.is_some(),
                    all_occurrences,
                    "removed event"
                );
                WriteReceipt {
                    calendar: target.calendar.clone(),
                    before: Some(removed),
                    after: None,
                }
            }
            WriteRequest::SetReminders {
                target,
                minutes,
                clear_existing,
            } => self.modify(target, |event| {
                if *clear_existing {
                    event.reminders.clear();
                }
                event.reminders.extend(minutes.iter().copied());
            })?,
        };
        tracing::info!(
            operation = request.operation(),
            calendar = request.calendar(),
            "store write applied"
        );
        Ok(receipt)
    }
}
