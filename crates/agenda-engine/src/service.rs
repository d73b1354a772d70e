//! Request-level operations over a [`CalendarStore`].
//!
//! [`AgendaService`] applies the configured [`QueryDefaults`], parses and
//! validates every caller-supplied value before the store is touched, then
//! delegates to the pure engine modules. Store failures are wrapped with the
//! operation name and never retried.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cancel::Cancellation;
use crate::conflict::{detect_conflicts, ConflictReport};
use crate::error::{AgendaError, Result};
use crate::export::{format_export, write_export, ExportFormat};
use crate::freetime::{find_free_slots, FreeSlot, FreeTimeOptions};
use crate::model::{Calendar, ScopedEvent};
use crate::query::{filter_events, FilterOptions, QueryResult};
use crate::recurrence::{Frequency, Recurrence};
use crate::stats::{compute_statistics, CalendarStatistics};
use crate::store::{
    CalendarStore, EventDraft, EventLocator, EventPatch, ReadRequest, WriteReceipt, WriteRequest,
};
use crate::temporal::{next_midnight, parse_date, parse_datetime, DateRange};

// ── Defaults ────────────────────────────────────────────────────────────────

/// Fallbacks for parameters a caller leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Span of `list_events` when no end is given.
    pub list_days: i64,
    /// Span of `search_events` when no end is given.
    pub search_days: i64,
    /// Span of free-time, conflict, statistics, and export requests.
    pub analysis_days: i64,
    pub max_events: usize,
    pub max_search_results: usize,
    pub free_slot_minutes: u32,
    pub max_suggestions: usize,
    pub business_hours_only: bool,
    /// Occurrences returned when a recurring series is created.
    pub recurrence_preview: u16,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            list_days: 7,
            search_days: 365,
            analysis_days: 7,
            max_events: 50,
            max_search_results: 20,
            free_slot_minutes: 30,
            max_suggestions: 5,
            business_hours_only: true,
            recurrence_preview: 5,
        }
    }
}

impl QueryDefaults {
    /// Upper bound for the `*_days` spans.
    pub const MAX_SPAN_DAYS: i64 = 36_600;

    /// Reject spans outside `0..=MAX_SPAN_DAYS` and a zero slot length.
    pub fn validate(&self) -> Result<()> {
        for (name, days) in [
            ("list_days", self.list_days),
            ("search_days", self.search_days),
            ("analysis_days", self.analysis_days),
        ] {
            if !(0..=Self::MAX_SPAN_DAYS).contains(&days) {
                return Err(AgendaError::InvalidRequest(format!(
                    "defaults.{name} must be between 0 and {}, got {days}",
                    Self::MAX_SPAN_DAYS
                )));
            }
        }
        if self.free_slot_minutes == 0 {
            return Err(AgendaError::InvalidRequest(
                "defaults.free_slot_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ListEventsRequest {
    pub calendar: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub max_results: Option<usize>,
    pub include_all_day: bool,
}

impl Default for ListEventsRequest {
    fn default() -> Self {
        Self {
            calendar: None,
            start: None,
            end: None,
            max_results: None,
            include_all_day: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub calendar: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub search_location: bool,
    pub search_notes: bool,
    pub max_results: Option<usize>,
}

/// Scope and window shared by the analysis operations.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub calendar: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FreeTimeRequest {
    pub window: AnalysisRequest,
    pub duration_minutes: Option<u32>,
    pub business_hours_only: Option<bool>,
    pub max_suggestions: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub window: AnalysisRequest,
    pub format: ExportFormat,
    /// Also write the rendered export here.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateEventRequest {
    pub calendar: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub attendees: Vec<String>,
    pub alert_minutes: Option<u32>,
    pub all_day: bool,
}

#[derive(Debug, Clone)]
pub struct RecurringEventRequest {
    pub event: CreateEventRequest,
    /// `daily`, `weekly`, `monthly`, or `yearly`.
    pub frequency: String,
    pub interval: u32,
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEventRequest {
    pub calendar: String,
    pub title: String,
    pub date: Option<String>,
    pub new_title: Option<String>,
    pub new_start: Option<String>,
    pub new_end: Option<String>,
    pub new_location: Option<String>,
    pub new_notes: Option<String>,
    pub new_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MoveEventRequest {
    pub calendar: String,
    pub title: String,
    pub current_date: String,
    pub new_start: String,
    pub new_end: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteEventRequest {
    pub calendar: String,
    pub title: String,
    pub date: String,
    pub all_occurrences: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemindersRequest {
    pub calendar: String,
    pub title: String,
    pub date: String,
    pub minutes: Vec<u32>,
    pub clear_existing: bool,
}

// ── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarOverview {
    pub today: NaiveDate,
    pub calendars: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodaysSchedule {
    pub date: NaiveDate,
    pub all_day: Vec<ScopedEvent>,
    pub timed: Vec<ScopedEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeTimeResult {
    pub slots: Vec<FreeSlot>,
    pub duration_minutes: u32,
    pub range: DateRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub format: ExportFormat,
    pub events: usize,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringEventResult {
    pub receipt: WriteReceipt,
    pub rule: String,
    /// The first few start times of the series.
    pub preview: Vec<NaiveDateTime>,
}

// ── Service ─────────────────────────────────────────────────────────────────

/// The scheduling engine bound to one store and one "now" anchor.
#[derive(Debug)]
pub struct AgendaService<S> {
    store: S,
    defaults: QueryDefaults,
    now: NaiveDateTime,
    cancel: Cancellation,
}

impl<S: CalendarStore> AgendaService<S> {
    pub fn new(store: S, defaults: QueryDefaults, now: NaiveDateTime) -> Self {
        Self {
            store,
            defaults,
            now,
            cancel: Cancellation::new(),
        }
    }

    /// Share a cancellation handle with the long-running scans.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    // ── reads ───────────────────────────────────────────────────────────────

    pub fn list_calendars(&self, include_counts: bool) -> Result<Vec<CalendarSummary>> {
        let names = self
            .store
            .calendar_names()
            .map_err(|e| e.context("list_calendars"))?;
        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let event_count = if include_counts {
                Some(
                    self.store
                        .count_events(&name)
                        .map_err(|e| e.context("list_calendars"))?,
                )
            } else {
                None
            };
            summaries.push(CalendarSummary { name, event_count });
        }
        Ok(summaries)
    }

    pub fn calendar_overview(&self) -> Result<CalendarOverview> {
        let calendars = self
            .store
            .calendar_names()
            .map_err(|e| e.context("calendar_overview"))?;
        Ok(CalendarOverview {
            today: self.now.date(),
            total: calendars.len(),
            calendars,
        })
    }

    pub fn list_events(&self, request: &ListEventsRequest) -> Result<QueryResult> {
        let range = DateRange::resolve(
            request.start.as_deref(),
            request.end.as_deref(),
            self.now,
            self.defaults.list_days,
        )?;
        let options = FilterOptions {
            calendar: request.calendar.clone(),
            max_results: request.max_results.unwrap_or(self.defaults.max_events),
            include_all_day: request.include_all_day,
            ..Default::default()
        };
        tracing::debug!(calendar = ?options.calendar, start = %range.start, end = %range.end, "list_events");
        let calendars = self.read(options.calendar.as_deref(), range, "list_events")?;
        filter_events(&calendars, &range, &options, &self.cancel)
    }

    pub fn search_events(&self, request: &SearchRequest) -> Result<QueryResult> {
        if request.query.trim().is_empty() {
            return Err(AgendaError::InvalidRequest(
                "search text must not be empty".to_string(),
            ));
        }
        let range = DateRange::resolve(
            request.start.as_deref(),
            request.end.as_deref(),
            self.now,
            self.defaults.search_days,
        )?;
        let options = FilterOptions {
            calendar: request.calendar.clone(),
            max_results: request.max_results.unwrap_or(self.defaults.max_search_results),
            include_all_day: true,
            text: Some(request.query.clone()),
            match_location: request.search_location,
            match_notes: request.search_notes,
        };
        tracing::debug!(query = %request.query, start = %range.start, end = %range.end, "search_events");
        let calendars = self.read(options.calendar.as_deref(), range, "search_events")?;
        filter_events(&calendars, &range, &options, &self.cancel)
    }

    /// The first event in `calendar` whose title contains `title`, optionally
    /// restricted to one day.
    pub fn get_event_details(
        &self,
        calendar: &str,
        title: &str,
        date: Option<&str>,
    ) -> Result<ScopedEvent> {
        let mut locator = EventLocator::new(calendar, title);
        let range = match date {
            Some(d) => {
                let day = parse_date(d)?;
                locator = locator.on(day);
                DateRange::day(day)
            }
            None => DateRange::unbounded(),
        };
        let calendars = self.read(Some(calendar), range, "get_event_details")?;
        calendars
            .into_iter()
            .flat_map(|c| {
                let name = c.name;
                c.events
                    .into_iter()
                    .map(move |e| ScopedEvent::new(name.clone(), e))
            })
            .find(|scoped| locator.matches(&scoped.event))
            .ok_or_else(|| {
                AgendaError::EventNotFound(match date {
                    Some(d) => format!("'{title}' in '{calendar}' on {d}"),
                    None => format!("'{title}' in '{calendar}'"),
                })
            })
    }

    /// Events starting in `[today 00:00, tomorrow 00:00)`.
    pub fn todays_schedule(&self, calendar: Option<&str>) -> Result<TodaysSchedule> {
        let today = self.now.date();
        let tomorrow = next_midnight(today);
        let calendars = self.read(calendar, DateRange::day(today), "todays_schedule")?;

        let mut all_day = Vec::new();
        let mut timed = Vec::new();
        for calendar in calendars {
            for event in calendar.events.into_iter().filter(|e| e.start < tomorrow) {
                let scoped = ScopedEvent::new(calendar.name.clone(), event);
                if scoped.event.all_day {
                    all_day.push(scoped);
                } else {
                    timed.push(scoped);
                }
            }
        }
        Ok(TodaysSchedule {
            date: today,
            all_day,
            timed,
        })
    }

    pub fn find_free_time(&self, request: &FreeTimeRequest) -> Result<FreeTimeResult> {
        let range = self.analysis_range(&request.window)?;
        let options = FreeTimeOptions {
            calendar: request.window.calendar.clone(),
            duration_minutes: request
                .duration_minutes
                .unwrap_or(self.defaults.free_slot_minutes),
            business_hours_only: request
                .business_hours_only
                .unwrap_or(self.defaults.business_hours_only),
            max_suggestions: request
                .max_suggestions
                .unwrap_or(self.defaults.max_suggestions),
        };
        if options.duration_minutes == 0 {
            return Err(AgendaError::InvalidRequest(
                "free-slot duration must be at least one minute".to_string(),
            ));
        }
        let calendars = self.read(options.calendar.as_deref(), range, "find_free_time")?;
        let slots = find_free_slots(&calendars, &range, &options, &self.cancel)?;
        Ok(FreeTimeResult {
            slots,
            duration_minutes: options.duration_minutes,
            range,
        })
    }

    pub fn detect_conflicts(&self, request: &AnalysisRequest) -> Result<ConflictReport> {
        let range = self.analysis_range(request)?;
        let calendars = self.read(request.calendar.as_deref(), range, "detect_conflicts")?;
        detect_conflicts(&calendars, &range, request.calendar.as_deref(), &self.cancel)
    }

    pub fn statistics(&self, request: &AnalysisRequest) -> Result<CalendarStatistics> {
        let range = self.analysis_range(request)?;
        let calendars = self.read(request.calendar.as_deref(), range, "statistics")?;
        compute_statistics(&calendars, &range, request.calendar.as_deref(), &self.cancel)
    }

    /// Render the events in the window and optionally write them to a file.
    /// iCalendar output is stamped with the current UTC time.
    ///
    /// # Errors
    ///
    /// A failed file write returns [`AgendaError::ExportWriteFailure`], which
    /// still carries the rendered data.
    pub fn export_events(&self, request: &ExportRequest) -> Result<ExportResult> {
        let range = self.analysis_range(&request.window)?;
        let calendars = self.read(request.window.calendar.as_deref(), range, "export_events")?;
        let options = FilterOptions {
            calendar: request.window.calendar.clone(),
            max_results: usize::MAX,
            ..Default::default()
        };
        let selected = filter_events(&calendars, &range, &options, &self.cancel)?;
        let data = format_export(&selected.events, request.format, &range, Utc::now())?;

        let (data, written_to) = match &request.output {
            Some(path) => (write_export(path, data)?, Some(path.clone())),
            None => (data, None),
        };
        tracing::debug!(
            format = %request.format,
            events = selected.events.len(),
            written = written_to.is_some(),
            "export_events"
        );
        Ok(ExportResult {
            format: request.format,
            events: selected.events.len(),
            data,
            written_to,
        })
    }

    // ── writes ──────────────────────────────────────────────────────────────

    pub fn create_event(&mut self, request: &CreateEventRequest) -> Result<WriteReceipt> {
        let draft = draft_from(request)?;
        self.ensure_calendar(&request.calendar, "create_event")?;
        self.write(WriteRequest::CreateEvent {
            calendar: request.calendar.clone(),
            draft,
        })
    }

    pub fn create_recurring_event(
        &mut self,
        request: &RecurringEventRequest,
    ) -> Result<RecurringEventResult> {
        let draft = draft_from(&request.event)?;
        let frequency: Frequency = request.frequency.parse()?;
        let until = request.until.as_deref().map(parse_datetime).transpose()?;
        let recurrence = Recurrence::new(frequency, request.interval, until)?;
        let preview = recurrence.occurrences(draft.start, self.defaults.recurrence_preview)?;
        self.ensure_calendar(&request.event.calendar, "create_recurring_event")?;

        let receipt = self.write(WriteRequest::CreateRecurringSeries {
            calendar: request.event.calendar.clone(),
            draft,
            recurrence: recurrence.clone(),
        })?;
        Ok(RecurringEventResult {
            receipt,
            rule: recurrence.to_string(),
            preview,
        })
    }

    /// Natural-language entry is not supported. The error explains how to
    /// use [`AgendaService::create_event`] instead.
    pub fn quick_add(&self, calendar: &str, text: &str) -> Result<WriteReceipt> {
        Err(AgendaError::Unsupported(format!(
            "cannot parse free-form event text '{text}'; create the event with explicit \
             fields instead, e.g. calendar='{calendar}', title='Your Event Title', \
             start='2025-01-15 14:00', end='2025-01-15 15:00'"
        )))
    }

    pub fn update_event(&mut self, request: &UpdateEventRequest) -> Result<WriteReceipt> {
        let patch = EventPatch {
            title: request.new_title.clone(),
            start: request.new_start.as_deref().map(parse_datetime).transpose()?,
            end: request.new_end.as_deref().map(parse_datetime).transpose()?,
            location: request.new_location.clone(),
            notes: request.new_notes.clone(),
            url: request.new_url.clone(),
        };
        if patch.is_empty() {
            return Err(AgendaError::InvalidRequest(
                "no fields to update".to_string(),
            ));
        }
        let target = locator(&request.calendar, &request.title, request.date.as_deref())?;
        self.ensure_calendar(&request.calendar, "update_event")?;
        self.write(WriteRequest::UpdateEvent { target, patch })
    }

    pub fn move_event(&mut self, request: &MoveEventRequest) -> Result<WriteReceipt> {
        let target = locator(&request.calendar, &request.title, Some(&request.current_date))?;
        let new_start = parse_datetime(&request.new_start)?;
        let new_end = request.new_end.as_deref().map(parse_datetime).transpose()?;
        if let Some(end) = new_end {
            DateRange::new(new_start, end)?;
        }
        self.ensure_calendar(&request.calendar, "move_event")?;
        self.write(WriteRequest::MoveEvent {
            target,
            new_start,
            new_end,
        })
    }

    pub fn delete_event(&mut self, request: &DeleteEventRequest) -> Result<WriteReceipt> {
        let target = locator(&request.calendar, &request.title, Some(&request.date))?;
        self.ensure_calendar(&request.calendar, "delete_event")?;
        self.write(WriteRequest::DeleteEvent {
            target,
            all_occurrences: request.all_occurrences,
        })
    }

    pub fn manage_reminders(&mut self, request: &RemindersRequest) -> Result<WriteReceipt> {
        let target = locator(&request.calendar, &request.title, Some(&request.date))?;
        if request.minutes.is_empty() && !request.clear_existing {
            return Err(AgendaError::InvalidRequest(
                "give reminder minutes, clear existing reminders, or both".to_string(),
            ));
        }
        self.ensure_calendar(&request.calendar, "manage_reminders")?;
        self.write(WriteRequest::SetReminders {
            target,
            minutes: request.minutes.clone(),
            clear_existing: request.clear_existing,
        })
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    fn analysis_range(&self, request: &AnalysisRequest) -> Result<DateRange> {
        DateRange::resolve(
            request.start.as_deref(),
            request.end.as_deref(),
            self.now,
            self.defaults.analysis_days,
        )
    }

    fn read(
        &self,
        calendar: Option<&str>,
        range: DateRange,
        operation: &str,
    ) -> Result<Vec<Calendar>> {
        self.store
            .read(&ReadRequest::new(calendar, range))
            .map_err(|e| e.context(operation))
    }

    fn ensure_calendar(&self, name: &str, operation: &str) -> Result<()> {
        let names = self
            .store
            .calendar_names()
            .map_err(|e| e.context(operation))?;
        if names.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(AgendaError::CalendarNotFound(format!("'{name}'")))
        }
    }

    fn write(&mut self, request: WriteRequest) -> Result<WriteReceipt> {
        let operation = request.operation();
        let receipt = self
            .store
            .write(&request)
            .map_err(|e| e.context(operation))?;
        tracing::info!(operation, calendar = %receipt.calendar, "calendar updated");
        Ok(receipt)
    }
}

fn draft_from(request: &CreateEventRequest) -> Result<EventDraft> {
    let start = parse_datetime(&request.start)?;
    let end = parse_datetime(&request.end)?;
    DateRange::new(start, end)?;
    if request.title.trim().is_empty() {
        return Err(AgendaError::InvalidRequest(
            "event title must not be empty".to_string(),
        ));
    }
    Ok(EventDraft {
        title: request.title.clone(),
        start,
        end,
        all_day: request.all_day,
        location: request.location.clone(),
        notes: request.notes.clone(),
        url: request.url.clone(),
        attendees: request.attendees.clone(),
        alert_minutes: request.alert_minutes,
    })
}

fn locator(calendar: &str, title: &str, date: Option<&str>) -> Result<EventLocator> {
    let locator = EventLocator::new(calendar, title);
    Ok(match date {
        Some(d) => locator.on(parse_date(d)?),
        None => locator,
    })
}
