//! Plain-text, CSV, and iCalendar renderings of an event list.
//!
//! Formatting only: callers filter first and hand over the events in the
//! order they should appear.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgendaError;
use crate::model::{Event, ScopedEvent};
use crate::temporal::{format_date, format_time, DateRange};

pub const CSV_HEADER: &str = "Title,Start Date,Start Time,End Date,End Time,Location,Calendar,All Day";

const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Csv,
    Ics,
}

impl ExportFormat {
    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Ics => "ics",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "csv" => Ok(ExportFormat::Csv),
            "ics" | "ical" => Ok(ExportFormat::Ics),
            other => Err(AgendaError::InvalidRequest(format!(
                "unknown export format '{other}' (expected txt, csv or ics)"
            ))),
        }
    }
}

/// Render `events` in `format`. `period` only feeds the text header and
/// `generated` becomes the iCalendar `DTSTAMP`.
///
/// # Errors
///
/// Returns [`AgendaError::ExportEncoding`] if the CSV writer fails.
pub fn format_export(
    events: &[ScopedEvent],
    format: ExportFormat,
    period: &DateRange,
    generated: DateTime<Utc>,
) -> Result<String, AgendaError> {
    match format {
        ExportFormat::Text => Ok(format_text(events, period)),
        ExportFormat::Csv => format_csv(events),
        ExportFormat::Ics => Ok(format_ics(events, generated)),
    }
}

/// Write `data` to `path`, handing it back on success.
///
/// # Errors
///
/// Returns [`AgendaError::ExportWriteFailure`], which still owns `data`, so
/// a failed write never loses the rendered export.
pub fn write_export(path: &Path, data: String) -> Result<String, AgendaError> {
    match std::fs::write(path, &data) {
        Ok(()) => Ok(data),
        Err(source) => {
            tracing::warn!(path = %path.display(), error = %source, "export write failed");
            Err(AgendaError::ExportWriteFailure {
                path: path.to_path_buf(),
                data,
                source,
            })
        }
    }
}

// ── text ────────────────────────────────────────────────────────────────────

fn format_text(events: &[ScopedEvent], period: &DateRange) -> String {
    let mut out = String::from("CALENDAR EXPORT\n");
    out.push_str(&format!(
        "Period: {} to {}\n{RULE}\n\n",
        period.start.format("%Y-%m-%d %H:%M"),
        period.end.format("%Y-%m-%d %H:%M")
    ));

    for ScopedEvent { calendar, event } in events {
        out.push_str(&event.title);
        out.push('\n');
        out.push_str(&format!("  {}\n", format_date(&event.start)));
        if event.all_day {
            out.push_str("  All Day Event\n");
        } else {
            out.push_str(&format!(
                "  {} - {}\n",
                format_time(&event.start),
                format_time(&event.end)
            ));
        }
        out.push_str(&format!("  Calendar: {calendar}\n"));
        if let Some(location) = non_empty(&event.location) {
            out.push_str(&format!("  Location: {location}\n"));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "{RULE}\nTotal: {} event(s) exported\n",
        events.len()
    ));
    out
}

// ── csv ─────────────────────────────────────────────────────────────────────

fn format_csv(events: &[ScopedEvent]) -> Result<String, AgendaError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER.split(','))?;

    for ScopedEvent { calendar, event } in events {
        let (start_time, end_time, all_day) = if event.all_day {
            ("All Day".to_string(), "All Day".to_string(), "Yes")
        } else {
            (
                event.start.format("%H:%M").to_string(),
                event.end.format("%H:%M").to_string(),
                "No",
            )
        };
        writer.write_record([
            csv_field(&event.title),
            event.start.format("%Y-%m-%d").to_string(),
            start_time,
            event.end.format("%Y-%m-%d").to_string(),
            end_time,
            csv_field(event.location.as_deref().unwrap_or("")),
            csv_field(calendar),
            all_day.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AgendaError::ExportEncoding(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| AgendaError::ExportEncoding(e.to_string()))
}

/// Commas become semicolons and line breaks become spaces, so each record
/// stays on one line with exactly eight fields. Quotes are left to the
/// writer.
fn csv_field(value: &str) -> String {
    value.replace(',', ";").replace(['\r', '\n'], " ")
}

// ── ics ─────────────────────────────────────────────────────────────────────

fn format_ics(events: &[ScopedEvent], generated: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Agenda//Calendar Export//EN".to_string(),
    ];
    let stamp = format!("DTSTAMP:{}", generated.format("%Y%m%dT%H%M%SZ"));

    for scoped in events {
        let event = &scoped.event;
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}", event_uid(scoped)));
        lines.push(stamp.clone());
        lines.push(format!("SUMMARY:{}", ics_text(&event.title)));
        lines.extend(ics_times(event));
        if let Some(location) = non_empty(&event.location) {
            lines.push(format!("LOCATION:{}", ics_text(location)));
        }
        if let Some(notes) = non_empty(&event.notes) {
            lines.push(format!("DESCRIPTION:{}", ics_text(notes)));
        }
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

/// Name-based, so exporting the same event twice yields the same UID.
fn event_uid(scoped: &ScopedEvent) -> String {
    let name = format!(
        "{}\u{1f}{}\u{1f}{}",
        scoped.calendar,
        scoped.event.title,
        scoped.event.start.format("%Y%m%dT%H%M%S")
    );
    format!("{}@agenda", Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

fn ics_times(event: &Event) -> [String; 2] {
    if event.all_day {
        let start = event.start.date();
        let end = event.end.date().max(start.succ_opt().unwrap_or(start));
        [
            format!("DTSTART;VALUE=DATE:{}", start.format("%Y%m%d")),
            format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")),
        ]
    } else {
        [
            format!("DTSTART:{}", event.start.format("%Y%m%dT%H%M%S")),
            format!("DTEND:{}", event.end.format("%Y%m%dT%H%M%S")),
        ]
    }
}

/// RFC 5545 TEXT escaping.
fn ics_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_datetime;
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    fn sample() -> Vec<ScopedEvent> {
        vec![
            ScopedEvent::new(
                "Work",
                Event::new("Budget, Q1", dt("2025-01-02 09:00"), dt("2025-01-02 10:30"))
                    .with_location("HQ, Floor 3")
                    .with_notes("Bring numbers; and slides"),
            ),
            ScopedEvent::new(
                "Home",
                Event::new("Holiday", dt("2025-01-03"), dt("2025-01-03")).all_day(),
            ),
        ]
    }

    fn stamp() -> DateTime<Utc> {
        dt("2025-01-01 12:00").and_utc()
    }

    fn period() -> DateRange {
        DateRange::new(dt("2025-01-01"), dt("2025-01-07")).unwrap()
    }

    #[test]
    fn test_format_parse_aliases() {
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("ical".parse::<ExportFormat>().unwrap(), ExportFormat::Ics);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_csv_replaces_commas() {
        let csv = format_export(&sample(), ExportFormat::Csv, &period(), stamp()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "Budget; Q1,2025-01-02,09:00,2025-01-02,10:30,HQ; Floor 3,Work,No"
        );
        assert_eq!(
            lines[2],
            "Holiday,2025-01-03,All Day,2025-01-03,All Day,,Home,Yes"
        );
    }

    #[test]
    fn test_csv_quotes_survive_a_reader() {
        let events = vec![ScopedEvent::new(
            "Work",
            Event::new("\"Launch\" review", dt("2025-01-02 09:00"), dt("2025-01-02 10:00"))
                .with_location("Pier \"7\""),
        )];
        let csv = format_export(&events, ExportFormat::Csv, &period(), stamp()).unwrap();
        assert!(csv.contains("\"\"\"Launch\"\" review\","));

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 8);
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "\"Launch\" review");
        assert_eq!(&records[0][5], "Pier \"7\"");
        assert_eq!(&records[0][7], "No");
    }

    #[test]
    fn test_csv_flattens_line_breaks() {
        let events = vec![ScopedEvent::new(
            "Work",
            Event::new("Two\nlines", dt("2025-01-02 09:00"), dt("2025-01-02 09:30")),
        )];
        let csv = format_export(&events, ExportFormat::Csv, &period(), stamp()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Two lines,"));
    }

    #[test]
    fn test_ics_structure() {
        let ics = format_export(&sample(), ExportFormat::Ics, &period(), stamp()).unwrap();
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert_eq!(ics.matches("END:VEVENT").count(), 2);
        assert!(ics.contains("SUMMARY:Budget\\, Q1\r\n"));
        assert!(ics.contains("LOCATION:HQ\\, Floor 3\r\n"));
        assert!(ics.contains("DESCRIPTION:Bring numbers\\; and slides\r\n"));
        assert!(ics.contains("DTSTART:20250102T090000\r\n"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20250103\r\nDTEND;VALUE=DATE:20250104\r\n"));
    }

    #[test]
    fn test_ics_events_carry_uid_and_stamp() {
        let ics = format_export(&sample(), ExportFormat::Ics, &period(), stamp()).unwrap();
        assert_eq!(ics.matches("DTSTAMP:20250101T120000Z\r\n").count(), 2);

        let uids: Vec<&str> = ics.lines().filter(|l| l.starts_with("UID:")).collect();
        assert_eq!(uids.len(), 2);
        assert_ne!(uids[0], uids[1]);
        assert!(uids.iter().all(|uid| uid.ends_with("@agenda")));

        let again = format_export(&sample(), ExportFormat::Ics, &period(), stamp()).unwrap();
        let again_uids: Vec<&str> = again.lines().filter(|l| l.starts_with("UID:")).collect();
        assert_eq!(uids, again_uids);
    }

    #[test]
    fn test_ics_omits_empty_optional_fields() {
        let ics = format_export(&sample()[1..], ExportFormat::Ics, &period(), stamp()).unwrap();
        assert!(!ics.contains("LOCATION:"));
        assert!(!ics.contains("DESCRIPTION:"));
    }

    #[test]
    fn test_text_lists_each_event() {
        let text = format_export(&sample(), ExportFormat::Text, &period(), stamp()).unwrap();
        assert!(text.starts_with("CALENDAR EXPORT\nPeriod: 2025-01-01 00:00 to 2025-01-07 00:00\n"));
        assert!(text.contains("Budget, Q1\n  Thursday, January 2, 2025\n  9:00 AM - 10:30 AM\n"));
        assert!(text.contains("  All Day Event\n  Calendar: Home\n"));
        assert!(text.contains("  Location: HQ, Floor 3\n"));
        assert!(text.ends_with("Total: 2 event(s) exported\n"));
    }

    #[test]
    fn test_write_export_roundtrips_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let data = write_export(&path, "a,b\n".to_string()).unwrap();
        assert_eq!(data, "a,b\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }

    #[test]
    fn test_write_failure_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("events.csv");
        let err = write_export(&path, "payload".to_string()).unwrap_err();
        match err {
            AgendaError::ExportWriteFailure { data, path: p, .. } => {
                assert_eq!(data, "payload");
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
