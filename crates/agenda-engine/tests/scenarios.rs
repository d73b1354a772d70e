//! End-to-end scenarios through `AgendaService` over a `MemoryStore`.

use agenda_engine::cancel::Cancellation;
use agenda_engine::error::{AgendaError, ErrorKind, Failure, Result};
use agenda_engine::export::ExportFormat;
use agenda_engine::model::{Calendar, Event};
use agenda_engine::service::{
    AgendaService, AnalysisRequest, CreateEventRequest, DeleteEventRequest, ExportRequest,
    FreeTimeRequest, ListEventsRequest, MoveEventRequest, QueryDefaults, RemindersRequest,
    SearchRequest, UpdateEventRequest,
};
use agenda_engine::store::{CalendarStore, MemoryStore, ReadRequest, WriteReceipt, WriteRequest};
use agenda_engine::temporal::parse_datetime;
use chrono::NaiveDateTime;

fn dt(s: &str) -> NaiveDateTime {
    parse_datetime(s).unwrap()
}

fn hour_long(title: &str, start: &str) -> Event {
    let start = dt(start);
    Event::new(title, start, start + chrono::Duration::minutes(60))
}

fn service_over(calendars: Vec<Calendar>) -> AgendaService<MemoryStore> {
    let store = MemoryStore::from_calendars(calendars).unwrap();
    AgendaService::new(store, QueryDefaults::default(), dt("2025-01-01 08:00"))
}

fn first_week() -> AnalysisRequest {
    AnalysisRequest {
        calendar: None,
        start: Some("2025-01-01".to_string()),
        end: Some("2025-01-07".to_string()),
    }
}

/// Three calendars, five one-hour meetings on 2 January, two overlapping pairs.
fn busy_thursday() -> Vec<Calendar> {
    vec![
        Calendar::new("Work")
            .with_event(hour_long("Planning", "2025-01-02 09:00"))
            .with_event(hour_long("Design review", "2025-01-02 14:00")),
        Calendar::new("Personal")
            .with_event(hour_long("Call with bank", "2025-01-02 09:30"))
            .with_event(hour_long("Pharmacy", "2025-01-02 14:30")),
        Calendar::new("Family").with_event(hour_long("School pickup", "2025-01-02 16:00")),
    ]
}

#[test]
fn test_two_overlapping_pairs_give_two_conflicts() {
    let service = service_over(busy_thursday());
    let report = service.detect_conflicts(&first_week()).unwrap();
    assert_eq!(report.total, 2);

    let pairs: Vec<(&str, &str)> = report
        .conflicts
        .iter()
        .map(|c| (c.first.event.title.as_str(), c.second.event.title.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("Planning", "Call with bank"), ("Design review", "Pharmacy")]
    );
}

#[test]
fn test_statistics_over_busy_thursday() {
    let service = service_over(busy_thursday());
    let stats = service.statistics(&first_week()).unwrap();
    assert_eq!(stats.total_events, 5);
    assert_eq!(stats.timed_events, 5);
    assert_eq!(stats.total_minutes, 300);
    assert_eq!(stats.average_minutes, 60);
    assert_eq!(stats.busiest_hours, vec![9, 14]);
}

#[test]
fn test_back_to_back_hours_touch_without_conflict() {
    let service = service_over(vec![Calendar::new("Work")
        .with_event(hour_long("First", "2025-01-02 09:00"))
        .with_event(hour_long("Second", "2025-01-02 10:00"))]);
    let report = service.detect_conflicts(&first_week()).unwrap();
    assert_eq!(report.total, 0);
}

#[test]
fn test_fully_busy_day_resumes_next_business_day() {
    let service = service_over(vec![Calendar::new("Work").with_event(Event::new(
        "Offsite",
        dt("2025-01-06 09:00"),
        dt("2025-01-06 17:00"),
    ))]);
    let result = service
        .find_free_time(&FreeTimeRequest {
            window: AnalysisRequest {
                calendar: None,
                start: Some("2025-01-06".to_string()),
                end: Some("2025-01-08".to_string()),
            },
            duration_minutes: Some(30),
            business_hours_only: Some(true),
            max_suggestions: Some(3),
        })
        .unwrap();
    let starts: Vec<NaiveDateTime> = result.slots.iter().map(|s| s.start).collect();
    assert_eq!(
        starts,
        vec![
            dt("2025-01-07 09:00"),
            dt("2025-01-07 09:30"),
            dt("2025-01-07 10:00"),
        ]
    );
}

#[test]
fn test_nonexistent_calendar_is_reported() {
    let service = service_over(busy_thursday());
    let err = service
        .list_events(&ListEventsRequest {
            calendar: Some("Nonexistent".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    let failure = Failure::from(&err);
    assert_eq!(failure.kind, ErrorKind::CalendarNotFound);
    assert_eq!(failure.message, "Calendar not found: 'Nonexistent'");
}

#[test]
fn test_range_start_and_end_are_inclusive() {
    let service = service_over(vec![Calendar::new("Work")
        .with_event(hour_long("At start", "2025-01-01 00:00"))
        .with_event(hour_long("At end", "2025-01-07 00:00"))]);
    let result = service
        .list_events(&ListEventsRequest {
            start: Some("2025-01-01".to_string()),
            end: Some("2025-01-07".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result.events.len(), 2);
}

#[test]
fn test_search_truncates_at_default_limit() {
    let mut work = Calendar::new("Work");
    for day in 1..=25 {
        work = work.with_event(hour_long("Weekly sync", &format!("2025-02-{day:02} 10:00")));
    }
    let service = service_over(vec![work]);
    let result = service
        .search_events(&SearchRequest {
            query: "SYNC".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result.events.len(), 20);
    assert!(result.truncated);
}

#[test]
fn test_event_lifecycle() {
    let mut service = service_over(vec![Calendar::new("Work")]);

    service
        .create_event(&CreateEventRequest {
            calendar: "Work".to_string(),
            title: "Quarterly review".to_string(),
            start: "2025-01-03 13:00".to_string(),
            end: "2025-01-03 14:30".to_string(),
            attendees: vec!["lee@example.com".to_string()],
            alert_minutes: Some(15),
            ..Default::default()
        })
        .unwrap();

    service
        .update_event(&UpdateEventRequest {
            calendar: "Work".to_string(),
            title: "quarterly".to_string(),
            date: Some("2025-01-03".to_string()),
            new_location: Some("Board room".to_string()),
            ..Default::default()
        })
        .unwrap();

    service
        .move_event(&MoveEventRequest {
            calendar: "Work".to_string(),
            title: "quarterly".to_string(),
            current_date: "2025-01-03".to_string(),
            new_start: "2025-01-06 10:00".to_string(),
            new_end: None,
        })
        .unwrap();

    service
        .manage_reminders(&RemindersRequest {
            calendar: "Work".to_string(),
            title: "quarterly".to_string(),
            date: "2025-01-06".to_string(),
            minutes: vec![60],
            clear_existing: true,
        })
        .unwrap();

    let details = service
        .get_event_details("Work", "Quarterly", Some("2025-01-06"))
        .unwrap();
    assert_eq!(details.event.start, dt("2025-01-06 10:00"));
    assert_eq!(details.event.end, dt("2025-01-06 11:30"));
    assert_eq!(details.event.location.as_deref(), Some("Board room"));
    assert_eq!(details.event.reminders, vec![60]);
    assert_eq!(details.event.attendees.len(), 1);

    service
        .delete_event(&DeleteEventRequest {
            calendar: "Work".to_string(),
            title: "quarterly".to_string(),
            date: "2025-01-06".to_string(),
            all_occurrences: true,
        })
        .unwrap();
    let err = service
        .get_event_details("Work", "Quarterly", None)
        .unwrap_err();
    assert!(matches!(err, AgendaError::EventNotFound(_)));
}

#[test]
fn test_export_writes_ics_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("week.ics");
    let service = service_over(busy_thursday());
    let result = service
        .export_events(&ExportRequest {
            window: first_week(),
            format: ExportFormat::Ics,
            output: Some(path.clone()),
        })
        .unwrap();
    assert_eq!(result.events, 5);
    assert_eq!(result.written_to.as_deref(), Some(path.as_path()));
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, result.data);
    assert_eq!(written.matches("BEGIN:VEVENT").count(), 5);
    assert_eq!(written.matches("\r\nUID:").count(), 5);
    assert_eq!(written.matches("\r\nDTSTAMP:").count(), 5);
}

#[test]
fn test_cancelled_service_stops_scans() {
    let cancel = Cancellation::new();
    let service = service_over(busy_thursday()).with_cancellation(cancel.clone());
    cancel.cancel();
    let err = service.detect_conflicts(&first_week()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

/// A store whose calendar application never answers.
struct UnreachableStore;

impl CalendarStore for UnreachableStore {
    fn calendar_names(&self) -> Result<Vec<String>> {
        Err(AgendaError::CollaboratorTimeout("no reply within 30s".to_string()))
    }

    fn read(&self, _request: &ReadRequest) -> Result<Vec<Calendar>> {
        Err(AgendaError::CollaboratorFailure("calendar app is not running".to_string()))
    }

    fn count_events(&self, _calendar: &str) -> Result<usize> {
        Err(AgendaError::CollaboratorFailure("calendar app is not running".to_string()))
    }

    fn write(&mut self, _request: &WriteRequest) -> Result<WriteReceipt> {
        Err(AgendaError::CollaboratorFailure("calendar app is not running".to_string()))
    }
}

#[test]
fn test_store_failures_carry_operation_context() {
    let service = AgendaService::new(UnreachableStore, QueryDefaults::default(), dt("2025-01-01"));
    let err = service.list_events(&ListEventsRequest::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    assert_eq!(
        err.to_string(),
        "Calendar store failure: list_events: calendar app is not running"
    );

    let err = service.list_calendars(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorTimeout);
    assert!(err.to_string().contains("list_calendars: no reply"));
}

#[test]
fn test_bad_input_fails_before_store_is_called() {
    let mut service =
        AgendaService::new(UnreachableStore, QueryDefaults::default(), dt("2025-01-01"));
    let err = service
        .create_event(&CreateEventRequest {
            calendar: "Work".to_string(),
            title: "Lunch".to_string(),
            start: "tomorrow noon".to_string(),
            end: "2025-01-02 13:00".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDateFormat);
}
